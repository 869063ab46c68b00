// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Channel-level behavior that runs without a GPU: audio mixing through
//! the frame tree, transform algebra, tween pacing and the interlaced
//! field bookkeeping. GPU rasterization scenarios live in
//! `gpu_conformance.rs`.

use std::sync::Arc;

use castmix::{
    AudioMixer, DataFrame, Easing, FieldMode, Frame, FrameTransform, PixelFormat, PixelFormatDesc,
    Tweened, VideoFormat,
};

fn audio_frame(tag: u64, value: i32, volume: f64) -> Frame {
    let format = VideoFormat::p576_25();
    let mut data = DataFrame::audio_only(tag, vec![value; format.audio_samples_per_frame]);
    data.transform_mut().volume = volume;
    Frame::Data(Arc::new(data))
}

/// Empty input still produces a full, silent sample vector.
#[test]
fn empty_tick_audio_is_silence() {
    let format = VideoFormat::p576_25();
    let mut mixer = AudioMixer::new(format.clone());
    let out = mixer.mix();
    assert_eq!(out.len(), format.audio_samples_per_frame);
    assert!(out.iter().all(|&s| s == 0));
}

/// A source fading in from silence ramps linearly across the second
/// tick, sample by sample.
#[test]
fn audio_ramp_continuity_from_silence() {
    let mut mixer = AudioMixer::new(VideoFormat::p576_25());

    audio_frame(42, 10_000, 0.0).accept(&mut mixer);
    let tick1 = mixer.mix();
    assert!(tick1.iter().all(|&s| s == 0), "tick 1 must be silent");

    audio_frame(42, 10_000, 1.0).accept(&mut mixer);
    let tick2 = mixer.mix();
    for (n, &sample) in tick2.iter().enumerate() {
        let expected = (10_000.0 * n as f64 / 1920.0).round() as i32;
        assert!(
            (sample - expected).abs() <= 1,
            "sample {n}: got {sample}, want {expected}"
        );
    }
}

/// Ramps stay continuous across several ticks of changing volume.
#[test]
fn audio_ramp_is_continuous_across_ticks() {
    let mut mixer = AudioMixer::new(VideoFormat::p576_25());

    audio_frame(5, 20_000, 1.0).accept(&mut mixer);
    mixer.mix();

    audio_frame(5, 20_000, 0.5).accept(&mut mixer);
    let out = mixer.mix();

    // Starts near full volume, ends near half.
    assert!((out[0] - 20_000).abs() <= 32);
    assert!((out[1919] - 10_000).abs() <= 32);
    // Monotone decrease, no discontinuities.
    for pair in out.windows(2) {
        assert!(pair[1] <= pair[0] + 1);
    }
}

/// Transform composition is associative under fetch at any tick.
#[test]
fn transform_composition_associative() {
    let mut a = FrameTransform::default();
    a.fill_translation = [0.2, 0.1];
    a.fill_scale = [0.5, 0.25];
    a.clip_translation = [0.1, 0.1];
    a.clip_scale = [0.8, 0.8];
    a.opacity = 0.9;

    let mut b = FrameTransform::default();
    b.fill_translation = [0.05, 0.3];
    b.fill_scale = [2.0, 0.5];
    b.volume = 0.7;
    b.field_mode = FieldMode::UPPER;

    let mut c = FrameTransform::default();
    c.fill_translation = [0.4, 0.6];
    c.brightness = 1.5;
    c.is_mix = true;

    let lhs = (a * b) * c;
    let rhs = a * (b * c);

    for (l, r) in [
        (lhs.fill_translation[0], rhs.fill_translation[0]),
        (lhs.fill_translation[1], rhs.fill_translation[1]),
        (lhs.fill_scale[0], rhs.fill_scale[0]),
        (lhs.fill_scale[1], rhs.fill_scale[1]),
        (lhs.clip_translation[0], rhs.clip_translation[0]),
        (lhs.clip_scale[0], rhs.clip_scale[0]),
        (lhs.opacity, rhs.opacity),
        (lhs.brightness, rhs.brightness),
        (lhs.volume, rhs.volume),
    ] {
        assert!((l - r).abs() < 1e-12, "{l} != {r}");
    }
    assert_eq!(lhs.field_mode, rhs.field_mode);
    assert_eq!(lhs.is_mix, rhs.is_mix);
}

/// An item masked to the empty field set composes to empty through any
/// parent and is what the mixers discard.
#[test]
fn empty_field_mode_survives_composition() {
    let mut parent = FrameTransform::default();
    parent.field_mode = FieldMode::UPPER;
    let mut child = FrameTransform::default();
    child.field_mode = FieldMode::LOWER;

    let composed = parent * child;
    assert_eq!(composed.field_mode, FieldMode::EMPTY);

    let progressive = FrameTransform::default();
    assert_eq!((progressive * parent).field_mode, FieldMode::UPPER);
}

/// Interlacing a progressive source exposes it to both field passes.
#[test]
fn interlace_keeps_progressive_sources_in_both_fields() {
    struct Fields(Vec<FieldMode>, Vec<FrameTransform>);
    impl castmix::FrameVisitor for Fields {
        fn begin(&mut self, t: &FrameTransform) {
            let top = self.1.last().copied().unwrap_or_default();
            self.1.push(top * *t);
        }
        fn visit(&mut self, _: &DataFrame) {
            self.0.push(self.1.last().unwrap().field_mode);
        }
        fn end(&mut self) {
            self.1.pop();
        }
    }

    let leaf = || {
        Frame::Data(Arc::new(DataFrame::new(
            1,
            PixelFormatDesc::new(PixelFormat::Invalid),
            Vec::new(),
        )))
    };

    let tree = Frame::interlace(leaf(), leaf(), FieldMode::UPPER);
    let mut probe = Fields(Vec::new(), Vec::new());
    tree.accept(&mut probe);
    assert_eq!(probe.0, vec![FieldMode::UPPER, FieldMode::LOWER]);
}

/// Tween pacing: interlaced channels pull twice per output frame, so a
/// duration counts fields, not frames.
#[test]
fn tween_tick_pacing() {
    let mut dest = FrameTransform::default();
    dest.opacity = 0.0;
    let mut tween = Tweened::new(FrameTransform::default(), dest, 4, Easing::Linear);

    // Two fields of an interlaced frame.
    let first = tween.fetch_and_tick(1);
    let second = tween.fetch_and_tick(1);
    assert!((first.opacity - 0.75).abs() < 1e-9);
    assert!((second.opacity - 0.5).abs() < 1e-9);
    assert!(!tween.done());

    tween.fetch_and_tick(2);
    assert!(tween.done());
    assert_eq!(tween.fetch().opacity, 0.0);
}

/// The easing catalog covers the command surface's required names and
/// falls back to linear for unknown ones.
#[test]
fn easing_names_resolve() {
    let required = [
        "linear",
        "ease_in_quad",
        "ease_out_quad",
        "ease_in_out_quad",
        "ease_in_cubic",
        "ease_out_cubic",
        "ease_in_out_cubic",
        "ease_in_quart",
        "ease_out_quart",
        "ease_in_out_quart",
        "ease_in_quint",
        "ease_out_quint",
        "ease_in_out_quint",
        "ease_in_sine",
        "ease_out_sine",
        "ease_in_out_sine",
        "ease_in_expo",
        "ease_out_expo",
        "ease_in_out_expo",
        "ease_in_circ",
        "ease_out_circ",
        "ease_in_out_circ",
        "ease_out_bounce",
    ];
    for name in required {
        let easing = Easing::from_name(name);
        if name != "linear" {
            assert_ne!(easing, Easing::Linear, "{name} must resolve");
        }
        // Every easing is exact at its endpoints.
        assert!(easing.apply(0.0).abs() < 1e-9);
        assert!((easing.apply(1.0) - 1.0).abs() < 1e-9);
    }
    assert_eq!(Easing::from_name("wobble"), Easing::Linear);
}

/// Audio cadence follows the format.
#[test]
fn audio_cadence_per_format() {
    assert_eq!(VideoFormat::p576_25().audio_samples_per_frame, 1920);
    assert_eq!(VideoFormat::p720_50().audio_samples_per_frame, 960);
    assert_eq!(VideoFormat::i1080_50().audio_samples_per_frame, 1920);
}
