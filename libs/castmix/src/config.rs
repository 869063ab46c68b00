// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Mixer settings.
//!
//! Loaded once at channel startup and fixed for the channel's lifetime,
//! like the video format itself.

use serde::{Deserialize, Serialize};

use crate::error::{MixerError, Result};

/// Tunables for a mixer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSettings {
    /// Compile the blend-mode shader variant. When false the kernel uses
    /// the simple compositing shader and non-normal layer blends degrade
    /// to normal.
    pub blend_modes: bool,

    /// Fence patience before the one-per-process GPU stall warning, in
    /// milliseconds.
    pub stall_warning_ms: u64,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            blend_modes: true,
            stall_warning_ms: 40,
        }
    }
}

impl MixerSettings {
    /// Parse settings from a TOML document. Missing keys take defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| MixerError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MixerSettings::default();
        assert!(settings.blend_modes);
        assert_eq!(settings.stall_warning_ms, 40);
    }

    #[test]
    fn test_from_toml_partial() {
        let settings = MixerSettings::from_toml("blend_modes = false\n").unwrap();
        assert!(!settings.blend_modes);
        assert_eq!(settings.stall_warning_ms, 40);
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(MixerSettings::from_toml("blend_modes = \"maybe\"").is_err());
    }
}
