// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Video format descriptors.
//!
//! A channel's format is fixed at creation time; the mixer never
//! negotiates formats with producers.

use serde::{Deserialize, Serialize};

/// Which scanlines of a frame a source contributes to.
///
/// This is a bitset, not a plain enum: interlaced rendering masks a
/// source's field mode with [`FieldMode::UPPER`] / [`FieldMode::LOWER`]
/// per pass, and transform composition intersects the bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldMode(u32);

impl FieldMode {
    /// Contributes to no scanlines. Items with this mode are discarded.
    pub const EMPTY: Self = Self(0);
    /// Even scanlines (0, 2, 4, ...).
    pub const UPPER: Self = Self(1 << 0);
    /// Odd scanlines (1, 3, 5, ...).
    pub const LOWER: Self = Self(1 << 1);
    /// All scanlines.
    pub const PROGRESSIVE: Self = Self(Self::UPPER.0 | Self::LOWER.0);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn is_interlaced(&self) -> bool {
        *self == Self::UPPER || *self == Self::LOWER
    }
}

impl std::ops::BitAnd for FieldMode {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl std::ops::BitOr for FieldMode {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Video format of a channel: geometry, field order, rate and the
/// per-tick audio cadence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoFormat {
    pub name: &'static str,
    pub width: usize,
    pub height: usize,
    pub field_mode: FieldMode,
    /// Full frames per second (fields per second / 2 for interlaced).
    pub fps: f64,
    /// Output image size in bytes (BGRA).
    pub size: usize,
    /// Mixed audio samples produced per tick (48 kHz stream).
    pub audio_samples_per_frame: usize,
}

pub const AUDIO_SAMPLE_RATE: usize = 48_000;

impl VideoFormat {
    pub fn custom(
        name: &'static str,
        width: usize,
        height: usize,
        field_mode: FieldMode,
        fps: f64,
    ) -> Self {
        Self {
            name,
            width,
            height,
            field_mode,
            fps,
            size: width * height * 4,
            audio_samples_per_frame: (AUDIO_SAMPLE_RATE as f64 / fps).round() as usize,
        }
    }

    /// 720x576 interlaced 25 fps, upper field first.
    pub fn pal() -> Self {
        Self::custom("PAL", 720, 576, FieldMode::UPPER, 25.0)
    }

    /// 720x486 interlaced 29.97 fps, lower field first.
    pub fn ntsc() -> Self {
        Self::custom("NTSC", 720, 486, FieldMode::LOWER, 30000.0 / 1001.0)
    }

    pub fn p576_25() -> Self {
        Self::custom("576p2500", 720, 576, FieldMode::PROGRESSIVE, 25.0)
    }

    pub fn p720_25() -> Self {
        Self::custom("720p2500", 1280, 720, FieldMode::PROGRESSIVE, 25.0)
    }

    pub fn p720_50() -> Self {
        Self::custom("720p5000", 1280, 720, FieldMode::PROGRESSIVE, 50.0)
    }

    pub fn p1080_25() -> Self {
        Self::custom("1080p2500", 1920, 1080, FieldMode::PROGRESSIVE, 25.0)
    }

    /// 1920x1080 interlaced 25 fps (50 fields), upper field first.
    pub fn i1080_50() -> Self {
        Self::custom("1080i5000", 1920, 1080, FieldMode::UPPER, 25.0)
    }

    pub fn is_interlaced(&self) -> bool {
        self.field_mode.is_interlaced()
    }

    /// Tween ticks consumed per output frame: one per field.
    pub fn ticks_per_frame(&self) -> u32 {
        if self.is_interlaced() { 2 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_mode_intersection() {
        assert_eq!(FieldMode::PROGRESSIVE & FieldMode::UPPER, FieldMode::UPPER);
        assert_eq!(FieldMode::UPPER & FieldMode::LOWER, FieldMode::EMPTY);
        assert_eq!(FieldMode::LOWER & FieldMode::PROGRESSIVE, FieldMode::LOWER);
    }

    #[test]
    fn test_field_mode_classes() {
        assert!(FieldMode::UPPER.is_interlaced());
        assert!(FieldMode::LOWER.is_interlaced());
        assert!(!FieldMode::PROGRESSIVE.is_interlaced());
        assert!(!FieldMode::EMPTY.is_interlaced());
    }

    #[test]
    fn test_pal_geometry() {
        let pal = VideoFormat::pal();
        assert_eq!(pal.size, 720 * 576 * 4);
        assert_eq!(pal.audio_samples_per_frame, 1920);
        assert!(pal.is_interlaced());
        assert_eq!(pal.ticks_per_frame(), 2);
    }

    #[test]
    fn test_progressive_format() {
        let f = VideoFormat::p1080_25();
        assert_eq!(f.size, 1920 * 1080 * 4);
        assert_eq!(f.ticks_per_frame(), 1);
        assert_eq!(f.audio_samples_per_frame, 1920);
    }

    #[test]
    fn test_ntsc_cadence() {
        let ntsc = VideoFormat::ntsc();
        // 48000 / (30000/1001) = 1601.6, rounded per frame.
        assert_eq!(ntsc.audio_samples_per_frame, 1602);
    }
}
