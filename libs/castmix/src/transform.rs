// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-layer frame transforms.
//!
//! A [`FrameTransform`] carries everything a single draw needs besides
//! the pixels: fill/clip geometry in normalized coordinates, color
//! adjustments, keying flags, the field mask and the audio volume.
//! Transforms compose down the frame tree (`a * b`) and interpolate
//! between tween keyframes.

use crate::format::FieldMode;
use crate::tween::Easing;

/// Levels adjustment: input range, gamma, output range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub min_input: f64,
    pub max_input: f64,
    pub gamma: f64,
    pub min_output: f64,
    pub max_output: f64,
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            min_input: 0.0,
            max_input: 1.0,
            gamma: 1.0,
            min_output: 0.0,
            max_output: 1.0,
        }
    }
}

impl Levels {
    /// Whether any field deviates enough from identity to be worth a
    /// shader pass. Thresholds match the kernel's uniform gating.
    pub fn is_active(&self) -> bool {
        self.min_input > 0.001
            || self.max_input < 0.999
            || self.min_output > 0.001
            || self.max_output < 0.999
            || (self.gamma - 1.0).abs() > 0.001
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    /// Fill rectangle origin in [0,1]^2 of the output.
    pub fill_translation: [f64; 2],
    pub fill_scale: [f64; 2],
    /// Scissor rectangle in normalized output coordinates.
    pub clip_translation: [f64; 2],
    pub clip_scale: [f64; 2],

    pub opacity: f64,
    pub gain: f64,
    pub brightness: f64,
    pub saturation: f64,
    pub contrast: f64,
    pub levels: Levels,

    pub field_mode: FieldMode,
    /// The item is an alpha mask for later items in its layer.
    pub is_key: bool,
    /// The item draws additively into the layer's mix buffer.
    pub is_mix: bool,

    /// Audio volume in [0,1].
    pub volume: f64,
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self {
            fill_translation: [0.0, 0.0],
            fill_scale: [1.0, 1.0],
            clip_translation: [0.0, 0.0],
            clip_scale: [1.0, 1.0],
            opacity: 1.0,
            gain: 1.0,
            brightness: 1.0,
            saturation: 1.0,
            contrast: 1.0,
            levels: Levels::default(),
            field_mode: FieldMode::PROGRESSIVE,
            is_key: false,
            is_mix: false,
            volume: 1.0,
        }
    }
}

impl FrameTransform {
    /// Whether color adjustment (contrast/saturation/brightness) deviates
    /// from identity.
    pub fn has_csb(&self) -> bool {
        (self.brightness - 1.0).abs() > 0.001
            || (self.saturation - 1.0).abs() > 0.001
            || (self.contrast - 1.0).abs() > 0.001
    }

    /// Interpolate between two transforms at eased progress `time/duration`.
    ///
    /// Scalars lerp through the easing; the field mask intersects and the
    /// keying flags combine, so a tween never resurrects scanlines or
    /// drops a key role that either endpoint holds.
    pub fn tween(time: f64, source: &Self, dest: &Self, duration: f64, easing: Easing) -> Self {
        let a = if duration == 0.0 {
            1.0
        } else {
            easing.apply(time / duration)
        };
        let mix = |s: f64, d: f64| s + (d - s) * a;
        Self {
            fill_translation: [
                mix(source.fill_translation[0], dest.fill_translation[0]),
                mix(source.fill_translation[1], dest.fill_translation[1]),
            ],
            fill_scale: [
                mix(source.fill_scale[0], dest.fill_scale[0]),
                mix(source.fill_scale[1], dest.fill_scale[1]),
            ],
            clip_translation: [
                mix(source.clip_translation[0], dest.clip_translation[0]),
                mix(source.clip_translation[1], dest.clip_translation[1]),
            ],
            clip_scale: [
                mix(source.clip_scale[0], dest.clip_scale[0]),
                mix(source.clip_scale[1], dest.clip_scale[1]),
            ],
            opacity: mix(source.opacity, dest.opacity),
            gain: mix(source.gain, dest.gain),
            brightness: mix(source.brightness, dest.brightness),
            saturation: mix(source.saturation, dest.saturation),
            contrast: mix(source.contrast, dest.contrast),
            levels: Levels {
                min_input: mix(source.levels.min_input, dest.levels.min_input),
                max_input: mix(source.levels.max_input, dest.levels.max_input),
                gamma: mix(source.levels.gamma, dest.levels.gamma),
                min_output: mix(source.levels.min_output, dest.levels.min_output),
                max_output: mix(source.levels.max_output, dest.levels.max_output),
            },
            field_mode: source.field_mode & dest.field_mode,
            is_key: source.is_key | dest.is_key,
            is_mix: source.is_mix | dest.is_mix,
            volume: mix(source.volume, dest.volume),
        }
    }
}

impl std::ops::Mul for FrameTransform {
    type Output = FrameTransform;

    /// Compose a parent transform with a child's: translations accumulate
    /// through the parent's scale, scales and scalars multiply, the field
    /// mask intersects and the keying flags combine.
    fn mul(self, rhs: FrameTransform) -> FrameTransform {
        FrameTransform {
            fill_translation: [
                self.fill_translation[0] + rhs.fill_translation[0] * self.fill_scale[0],
                self.fill_translation[1] + rhs.fill_translation[1] * self.fill_scale[1],
            ],
            fill_scale: [
                self.fill_scale[0] * rhs.fill_scale[0],
                self.fill_scale[1] * rhs.fill_scale[1],
            ],
            clip_translation: [
                self.clip_translation[0] + rhs.clip_translation[0] * self.clip_scale[0],
                self.clip_translation[1] + rhs.clip_translation[1] * self.clip_scale[1],
            ],
            clip_scale: [
                self.clip_scale[0] * rhs.clip_scale[0],
                self.clip_scale[1] * rhs.clip_scale[1],
            ],
            opacity: self.opacity * rhs.opacity,
            gain: self.gain * rhs.gain,
            brightness: self.brightness * rhs.brightness,
            saturation: self.saturation * rhs.saturation,
            contrast: self.contrast * rhs.contrast,
            levels: Levels {
                min_input: self.levels.min_input.max(rhs.levels.min_input),
                max_input: self.levels.max_input.min(rhs.levels.max_input),
                gamma: self.levels.gamma * rhs.levels.gamma,
                min_output: self.levels.min_output.max(rhs.levels.min_output),
                max_output: self.levels.max_output.min(rhs.levels.max_output),
            },
            field_mode: self.field_mode & rhs.field_mode,
            is_key: self.is_key | rhs.is_key,
            is_mix: self.is_mix | rhs.is_mix,
            volume: self.volume * rhs.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identity_composition() {
        let id = FrameTransform::default();
        let mut t = FrameTransform::default();
        t.fill_translation = [0.25, 0.5];
        t.fill_scale = [0.5, 0.5];
        t.opacity = 0.7;
        assert_eq!(id * t, t);
        assert_eq!(t * id, t);
    }

    #[test]
    fn test_translation_through_parent_scale() {
        let mut parent = FrameTransform::default();
        parent.fill_translation = [0.1, 0.2];
        parent.fill_scale = [0.5, 0.5];
        let mut child = FrameTransform::default();
        child.fill_translation = [0.4, 0.4];

        let c = parent * child;
        assert!(close(c.fill_translation[0], 0.1 + 0.4 * 0.5));
        assert!(close(c.fill_translation[1], 0.2 + 0.4 * 0.5));
    }

    #[test]
    fn test_composition_associative() {
        let mut a = FrameTransform::default();
        a.fill_translation = [0.1, 0.0];
        a.fill_scale = [0.5, 2.0];
        a.opacity = 0.9;
        let mut b = FrameTransform::default();
        b.fill_translation = [0.3, 0.25];
        b.fill_scale = [0.25, 0.5];
        b.volume = 0.5;
        let mut c = FrameTransform::default();
        c.fill_translation = [0.05, 0.6];
        c.gain = 2.0;
        c.field_mode = FieldMode::UPPER;

        let lhs = (a * b) * c;
        let rhs = a * (b * c);
        assert!(close(lhs.fill_translation[0], rhs.fill_translation[0]));
        assert!(close(lhs.fill_translation[1], rhs.fill_translation[1]));
        assert!(close(lhs.fill_scale[0], rhs.fill_scale[0]));
        assert!(close(lhs.opacity, rhs.opacity));
        assert!(close(lhs.gain, rhs.gain));
        assert!(close(lhs.volume, rhs.volume));
        assert_eq!(lhs.field_mode, rhs.field_mode);
    }

    #[test]
    fn test_field_mask_and_flags() {
        let mut key = FrameTransform::default();
        key.is_key = true;
        key.field_mode = FieldMode::UPPER;
        let mut fill = FrameTransform::default();
        fill.field_mode = FieldMode::LOWER;

        let c = key * fill;
        assert!(c.is_key);
        assert_eq!(c.field_mode, FieldMode::EMPTY);
    }

    #[test]
    fn test_tween_endpoints() {
        let src = FrameTransform::default();
        let mut dst = FrameTransform::default();
        dst.opacity = 0.0;
        dst.fill_translation = [1.0, 1.0];

        let start = FrameTransform::tween(0.0, &src, &dst, 10.0, Easing::Linear);
        let end = FrameTransform::tween(10.0, &src, &dst, 10.0, Easing::Linear);
        assert!(close(start.opacity, 1.0));
        assert!(close(end.opacity, 0.0));
        assert!(close(end.fill_translation[0], 1.0));
    }

    #[test]
    fn test_tween_midpoint_linear() {
        let src = FrameTransform::default();
        let mut dst = FrameTransform::default();
        dst.volume = 0.0;
        let mid = FrameTransform::tween(5.0, &src, &dst, 10.0, Easing::Linear);
        assert!(close(mid.volume, 0.5));
    }

    #[test]
    fn test_levels_activity() {
        assert!(!Levels::default().is_active());
        let mut l = Levels::default();
        l.gamma = 2.2;
        assert!(l.is_active());
    }
}
