// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Layer blend modes.
//!
//! The discriminants are shader ABI: the fragment shader switches on
//! the raw integer. Index 12 (soft light) is reserved and unimplemented
//! in the shader; parsing never produces it.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum BlendMode {
    #[default]
    Normal = 0,
    Lighten = 1,
    Darken = 2,
    Multiply = 3,
    Average = 4,
    Add = 5,
    Subtract = 6,
    Difference = 7,
    Negation = 8,
    Exclusion = 9,
    Screen = 10,
    Overlay = 11,
    HardLight = 13,
    ColorDodge = 14,
    ColorBurn = 15,
    LinearDodge = 16,
    LinearBurn = 17,
    LinearLight = 18,
    VividLight = 19,
    PinLight = 20,
    HardMix = 21,
    Reflect = 22,
    Glow = 23,
    Phoenix = 24,
    Hue = 25,
    Saturation = 26,
    Color = 27,
    Luminosity = 28,
}

impl BlendMode {
    /// Parse a blend-mode name from the channel command surface.
    /// Case-insensitive; unknown names map to `Normal`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "lighten" => BlendMode::Lighten,
            "darken" => BlendMode::Darken,
            "multiply" => BlendMode::Multiply,
            "average" => BlendMode::Average,
            "add" => BlendMode::Add,
            "subtract" => BlendMode::Subtract,
            "difference" => BlendMode::Difference,
            "negation" => BlendMode::Negation,
            "exclusion" => BlendMode::Exclusion,
            "screen" => BlendMode::Screen,
            "overlay" => BlendMode::Overlay,
            "hard_light" => BlendMode::HardLight,
            "color_dodge" => BlendMode::ColorDodge,
            "color_burn" => BlendMode::ColorBurn,
            "linear_dodge" => BlendMode::LinearDodge,
            "linear_burn" => BlendMode::LinearBurn,
            "linear_light" => BlendMode::LinearLight,
            "vivid_light" => BlendMode::VividLight,
            "pin_light" => BlendMode::PinLight,
            "hard_mix" => BlendMode::HardMix,
            "reflect" => BlendMode::Reflect,
            "glow" => BlendMode::Glow,
            "phoenix" => BlendMode::Phoenix,
            "hue" => BlendMode::Hue,
            "saturation" => BlendMode::Saturation,
            "color" => BlendMode::Color,
            "luminosity" => BlendMode::Luminosity,
            _ => BlendMode::Normal,
        }
    }
}

/// How a draw combines with its background in the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Keyer {
    /// `fore + (1 - fore.a) * back`
    #[default]
    Linear = 0,
    /// `fore + back`
    Additive = 1,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_indices() {
        assert_eq!(BlendMode::Normal as i32, 0);
        assert_eq!(BlendMode::Overlay as i32, 11);
        // Soft light's slot stays vacant.
        assert_eq!(BlendMode::HardLight as i32, 13);
        assert_eq!(BlendMode::Luminosity as i32, 28);
    }

    #[test]
    fn test_parse_known_names() {
        assert_eq!(BlendMode::from_name("screen"), BlendMode::Screen);
        assert_eq!(BlendMode::from_name("COLOR_DODGE"), BlendMode::ColorDodge);
        assert_eq!(BlendMode::from_name("Phoenix"), BlendMode::Phoenix);
    }

    #[test]
    fn test_parse_unknown_is_normal() {
        assert_eq!(BlendMode::from_name("soft_light"), BlendMode::Normal);
        assert_eq!(BlendMode::from_name(""), BlendMode::Normal);
        assert_eq!(BlendMode::from_name("glitter"), BlendMode::Normal);
    }
}
