// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The audio mixer.
//!
//! Sums each source's signed 32-bit samples into the tick's output with
//! a per-sample volume ramp from the volume last observed for that
//! source to its current one. History is keyed by the producer's stable
//! tag; a source absent for a tick forgets its history.

use ahash::AHashMap;

use crate::format::{FieldMode, VideoFormat};
use crate::frame::{DataFrame, FrameVisitor};
use crate::transform::FrameTransform;

/// Volumes below this on the transform stack are silence at visit time.
const VISIT_VOLUME_FLOOR: f64 = 0.002;
/// A ramp whose endpoints are both below this contributes nothing.
const MIX_VOLUME_FLOOR: f64 = 0.001;

/// Fixed-point scale for the volume ramp.
const VOLUME_BASE: i64 = 1 << 31;

struct AudioItem {
    tag: u64,
    transform: FrameTransform,
    samples: Vec<i32>,
}

pub struct AudioMixer {
    format: VideoFormat,
    transform_stack: Vec<FrameTransform>,
    prev_transforms: AHashMap<u64, FrameTransform>,
    items: Vec<AudioItem>,
    /// Items dropped this tick because their sample count did not match
    /// the channel cadence.
    dropped_items: u64,
}

impl AudioMixer {
    pub fn new(format: VideoFormat) -> Self {
        Self {
            format,
            transform_stack: vec![FrameTransform::default()],
            prev_transforms: AHashMap::new(),
            items: Vec::new(),
            dropped_items: 0,
        }
    }

    /// Mix the tick's accumulated items into one sample vector of
    /// exactly `audio_samples_per_frame` elements.
    pub fn mix(&mut self) -> Vec<i32> {
        let mut result = vec![0i32; self.format.audio_samples_per_frame];
        let mut next_transforms = AHashMap::with_capacity(self.items.len());

        for item in self.items.drain(..) {
            let next = item.transform;
            let prev = self
                .prev_transforms
                .get(&item.tag)
                .copied()
                .unwrap_or(next);

            // Every active tag is remembered; absent ones fall away
            // below.
            next_transforms.insert(item.tag, next);

            if next.volume < MIX_VOLUME_FLOOR && prev.volume < MIX_VOLUME_FLOOR {
                continue;
            }

            if item.samples.is_empty() {
                continue;
            }
            if item.samples.len() != result.len() {
                self.dropped_items += 1;
                tracing::debug!(
                    tag = item.tag,
                    got = item.samples.len(),
                    want = result.len(),
                    "audio item length mismatch; dropped"
                );
                continue;
            }

            let next_volume = (next.volume * VOLUME_BASE as f64) as i64;
            let prev_volume = (prev.volume * VOLUME_BASE as f64) as i64;
            let n_samples = result.len() as i64;

            for (n, (out, sample)) in result.iter_mut().zip(&item.samples).enumerate() {
                let n = n as i64;
                let volume =
                    (prev_volume - (prev_volume * n) / n_samples) + (next_volume * n) / n_samples;
                *out += ((*sample as i64 * volume) / VOLUME_BASE) as i32;
            }
        }

        self.prev_transforms = next_transforms;
        result
    }

    /// Mismatched-length items dropped since startup.
    pub fn dropped_items(&self) -> u64 {
        self.dropped_items
    }
}

impl FrameVisitor for AudioMixer {
    fn begin(&mut self, transform: &FrameTransform) {
        let top = *self.transform_stack.last().expect("transform stack root");
        self.transform_stack.push(top * *transform);
    }

    fn visit(&mut self, frame: &DataFrame) {
        let top = *self.transform_stack.last().expect("transform stack root");

        // Interlaced rendering walks the tree once per output frame with
        // both fields present; only the second field carries audio, so
        // the copy matching the channel's leading field is skipped.
        if self.format.field_mode == FieldMode::UPPER && top.field_mode == FieldMode::UPPER {
            return;
        }
        if self.format.field_mode == FieldMode::LOWER && top.field_mode == FieldMode::LOWER {
            return;
        }

        // A source below the volume floor contributes no samples this
        // tick, but its transform is still recorded: the ramp out of
        // silence starts from the volume actually observed, not from
        // wherever the source happens to be when it becomes audible.
        let samples = if top.volume < VISIT_VOLUME_FLOOR {
            Vec::new()
        } else {
            frame.audio().to_vec()
        };

        self.items.push(AudioItem {
            tag: frame.tag(),
            transform: top,
            samples,
        });
    }

    fn end(&mut self) {
        self.transform_stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use std::sync::Arc;

    fn format() -> VideoFormat {
        crate::format::VideoFormat::p576_25()
    }

    fn frame_with_volume(tag: u64, samples: Vec<i32>, volume: f64) -> Frame {
        let mut data = DataFrame::audio_only(tag, samples);
        data.transform_mut().volume = volume;
        Frame::Data(Arc::new(data))
    }

    #[test]
    fn test_output_length_matches_format() {
        let mut mixer = AudioMixer::new(format());
        assert_eq!(mixer.mix().len(), 1920);
    }

    #[test]
    fn test_silence_when_no_items() {
        let mut mixer = AudioMixer::new(format());
        assert!(mixer.mix().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_first_observation_has_flat_ramp() {
        let mut mixer = AudioMixer::new(format());
        frame_with_volume(1, vec![10_000; 1920], 1.0).accept(&mut mixer);
        let out = mixer.mix();
        assert!(out.iter().all(|&s| (s - 10_000).abs() <= 1));
    }

    #[test]
    fn test_volume_ramp_across_ticks() {
        let mut mixer = AudioMixer::new(format());

        // Tick 1: silent; both endpoints below the floor.
        frame_with_volume(7, vec![10_000; 1920], 0.0).accept(&mut mixer);
        assert!(mixer.mix().iter().all(|&s| s == 0));

        // Tick 2: ramp 0.0 -> 1.0 across the frame.
        frame_with_volume(7, vec![10_000; 1920], 1.0).accept(&mut mixer);
        let out = mixer.mix();
        for (n, &sample) in out.iter().enumerate() {
            let expected = (10_000.0 * n as f64 / 1920.0).round() as i32;
            assert!(
                (sample - expected).abs() <= 1,
                "sample {n}: {sample} vs {expected}"
            );
        }
    }

    #[test]
    fn test_absent_source_forgets_history() {
        let mut mixer = AudioMixer::new(format());
        frame_with_volume(3, vec![1_000; 1920], 1.0).accept(&mut mixer);
        mixer.mix();

        // Source 3 skips a tick.
        mixer.mix();

        // It returns at half volume: no ramp from the old 1.0, flat 0.5.
        frame_with_volume(3, vec![1_000; 1920], 0.5).accept(&mut mixer);
        let out = mixer.mix();
        assert!(out.iter().all(|&s| (s - 500).abs() <= 1));
    }

    #[test]
    fn test_sources_sum() {
        let mut mixer = AudioMixer::new(format());
        frame_with_volume(1, vec![1_000; 1920], 1.0).accept(&mut mixer);
        frame_with_volume(2, vec![500; 1920], 1.0).accept(&mut mixer);
        let out = mixer.mix();
        assert!(out.iter().all(|&s| (s - 1_500).abs() <= 2));
    }

    #[test]
    fn test_length_mismatch_dropped() {
        let mut mixer = AudioMixer::new(format());
        frame_with_volume(1, vec![1_000; 960], 1.0).accept(&mut mixer);
        let out = mixer.mix();
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(mixer.dropped_items(), 1);
    }

    #[test]
    fn test_quiet_visit_skipped() {
        let mut mixer = AudioMixer::new(format());
        frame_with_volume(1, vec![i32::MAX; 1920], 0.001).accept(&mut mixer);
        assert!(mixer.mix().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_interlaced_first_field_skipped() {
        // Upper-field-first channel: the upper-field copy of a source is
        // the duplicate; only the lower (second) field contributes.
        let mut mixer = AudioMixer::new(crate::format::VideoFormat::pal());

        let first = frame_with_volume(9, vec![2_000; 1920], 1.0);
        let second = frame_with_volume(9, vec![2_000; 1920], 1.0);
        Frame::interlace(first, second, FieldMode::UPPER).accept(&mut mixer);

        let out = mixer.mix();
        // One contribution, not two.
        assert!(out.iter().all(|&s| (s - 2_000).abs() <= 1));
    }

    #[test]
    fn test_group_volume_composes() {
        let mut mixer = AudioMixer::new(format());
        let inner = frame_with_volume(4, vec![8_000; 1920], 0.5);
        let mut outer = FrameTransform::default();
        outer.volume = 0.5;
        Frame::with_transform(inner, outer).accept(&mut mixer);
        let out = mixer.mix();
        assert!(out.iter().all(|&s| (s - 2_000).abs() <= 2));
    }
}
