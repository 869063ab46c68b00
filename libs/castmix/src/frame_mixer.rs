// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The per-channel frame mixer.
//!
//! One worker thread per channel consumes `{layer → frame}` maps at
//! tick rate, advances the tweened transforms, drives the image and
//! audio mixers, and emits finished frames into a bounded output
//! channel. Both ends are capacity 2: a slow consumer backs the mixer
//! up, a slow mixer backs the producer up.
//!
//! Transform commands travel on the same queue as frames, so an update
//! issued before a tick is always visible to that tick's render.

use std::collections::BTreeMap;
use std::thread::JoinHandle;
use std::time::Instant;

use ahash::AHashMap;
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::audio::AudioMixer;
use crate::config::MixerSettings;
use crate::diag::ChannelDiag;
use crate::error::{MixerError, Result};
use crate::format::{FieldMode, VideoFormat};
use crate::frame::Frame;
use crate::image::{BlendMode, FrameImage, ImageMixer};
use crate::ogl::GlDevice;
use crate::transform::FrameTransform;
use crate::tween::{Easing, Tweened};

/// One tick's output: BGRA image bytes plus the mixed audio. The image
/// bytes stay valid while the frame (and with it the readback buffer)
/// is held.
pub struct FinishedFrame {
    pub image: FrameImage,
    pub audio: Vec<i32>,
}

/// Consumer end of a channel's finished-frame stream (bounded,
/// capacity 2 — a slow consumer backpressures the mixer).
pub type FrameReceiver = Receiver<FinishedFrame>;

type TransformFn = Box<dyn FnOnce(FrameTransform) -> FrameTransform + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransformTarget {
    Image,
    Audio,
}

enum Command {
    Frames(BTreeMap<i32, Frame>),
    SetBlendMode {
        layer: i32,
        mode: BlendMode,
    },
    SetTransform {
        target: TransformTarget,
        layer: Option<i32>,
        func: TransformFn,
        duration: u32,
        easing: Easing,
    },
    ResetTransform {
        target: TransformTarget,
        layer: Option<i32>,
        duration: u32,
        easing: Easing,
    },
    ClearTransforms,
    Stop,
}

pub struct FrameMixer {
    commands: Sender<Command>,
    diag: ChannelDiag,
    join: Option<JoinHandle<()>>,
}

impl FrameMixer {
    /// Spin up the channel worker. Returns the mixer handle and the
    /// consumer end of the finished-frame stream.
    pub fn new(
        device: &GlDevice,
        format: VideoFormat,
        settings: &MixerSettings,
    ) -> Result<(Self, FrameReceiver)> {
        let (command_tx, command_rx) = bounded::<Command>(2);
        let (output_tx, output_rx) = bounded::<FinishedFrame>(2);
        let diag = ChannelDiag::new();

        let image_mixer = ImageMixer::new(device, settings)?;
        let audio_mixer = AudioMixer::new(format.clone());

        let worker_diag = diag.clone();
        let worker_format = format.clone();
        let join = std::thread::Builder::new()
            .name(format!("frame-mixer-{}", format.name))
            .spawn(move || {
                Worker {
                    format: worker_format,
                    image_mixer,
                    audio_mixer,
                    image_transforms: AHashMap::new(),
                    audio_transforms: AHashMap::new(),
                    root_image: Tweened::default(),
                    root_audio: Tweened::default(),
                    blend_modes: AHashMap::new(),
                    diag: worker_diag,
                }
                .run(command_rx, output_tx);
            })
            .map_err(|e| MixerError::Context(format!("failed to spawn channel thread: {e}")))?;

        tracing::info!(format = format.name, "frame mixer initialized");
        Ok((
            Self {
                commands: command_tx,
                diag,
                join: Some(join),
            },
            output_rx,
        ))
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| MixerError::ChannelStopped)
    }

    /// Feed one tick's frames. Blocks when the mixer is two ticks
    /// behind.
    pub fn send(&self, frames: BTreeMap<i32, Frame>) -> Result<()> {
        self.command(Command::Frames(frames))
    }

    pub fn set_blend_mode(&self, layer: i32, mode: BlendMode) -> Result<()> {
        self.command(Command::SetBlendMode { layer, mode })
    }

    /// Tween a layer's (or, with `layer == None`, the root) image
    /// transform to `transform` over `duration` ticks.
    pub fn set_image_transform(
        &self,
        layer: Option<i32>,
        transform: FrameTransform,
        duration: u32,
        easing: &str,
    ) -> Result<()> {
        self.command(Command::SetTransform {
            target: TransformTarget::Image,
            layer,
            func: Box::new(move |_| transform),
            duration,
            easing: Easing::from_name(easing),
        })
    }

    pub fn set_audio_transform(
        &self,
        layer: Option<i32>,
        transform: FrameTransform,
        duration: u32,
        easing: &str,
    ) -> Result<()> {
        self.command(Command::SetTransform {
            target: TransformTarget::Audio,
            layer,
            func: Box::new(move |_| transform),
            duration,
            easing: Easing::from_name(easing),
        })
    }

    /// Like `set_image_transform`, but the destination is derived from
    /// the currently fetched value.
    pub fn apply_image_transform(
        &self,
        layer: Option<i32>,
        func: impl FnOnce(FrameTransform) -> FrameTransform + Send + 'static,
        duration: u32,
        easing: &str,
    ) -> Result<()> {
        self.command(Command::SetTransform {
            target: TransformTarget::Image,
            layer,
            func: Box::new(func),
            duration,
            easing: Easing::from_name(easing),
        })
    }

    pub fn apply_audio_transform(
        &self,
        layer: Option<i32>,
        func: impl FnOnce(FrameTransform) -> FrameTransform + Send + 'static,
        duration: u32,
        easing: &str,
    ) -> Result<()> {
        self.command(Command::SetTransform {
            target: TransformTarget::Audio,
            layer,
            func: Box::new(func),
            duration,
            easing: Easing::from_name(easing),
        })
    }

    /// Tween back to identity; `layer == None` resets every layer and
    /// the root.
    pub fn reset_image_transform(
        &self,
        layer: Option<i32>,
        duration: u32,
        easing: &str,
    ) -> Result<()> {
        self.command(Command::ResetTransform {
            target: TransformTarget::Image,
            layer,
            duration,
            easing: Easing::from_name(easing),
        })
    }

    pub fn reset_audio_transform(
        &self,
        layer: Option<i32>,
        duration: u32,
        easing: &str,
    ) -> Result<()> {
        self.command(Command::ResetTransform {
            target: TransformTarget::Audio,
            layer,
            duration,
            easing: Easing::from_name(easing),
        })
    }

    /// Drop all tweens, roots and per-layer blend modes.
    pub fn clear_transforms(&self) -> Result<()> {
        self.command(Command::ClearTransforms)
    }

    pub fn diag(&self) -> ChannelDiag {
        self.diag.clone()
    }

    /// Stop the channel. Queued ticks still render; the output channel
    /// closes afterwards.
    pub fn stop(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for FrameMixer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    format: VideoFormat,
    image_mixer: ImageMixer,
    audio_mixer: AudioMixer,
    image_transforms: AHashMap<i32, Tweened<FrameTransform>>,
    audio_transforms: AHashMap<i32, Tweened<FrameTransform>>,
    root_image: Tweened<FrameTransform>,
    root_audio: Tweened<FrameTransform>,
    blend_modes: AHashMap<i32, BlendMode>,
    diag: ChannelDiag,
}

impl Worker {
    fn run(mut self, commands: Receiver<Command>, output: Sender<FinishedFrame>) {
        for command in commands {
            match command {
                Command::Frames(frames) => {
                    let (frame, frame_time_us, wait_ms) = self.tick(&frames);
                    self.diag
                        .record_dropped_audio(self.audio_mixer.dropped_items());
                    self.diag
                        .record_tick(frame_time_us, wait_ms, output.len() as u64);
                    if output.send(frame).is_err() {
                        break;
                    }
                }
                Command::SetBlendMode { layer, mode } => {
                    self.blend_modes.insert(layer, mode);
                }
                Command::SetTransform {
                    target,
                    layer,
                    func,
                    duration,
                    easing,
                } => {
                    let entry = self.transform_entry(target, layer);
                    let source = entry.fetch();
                    *entry = Tweened::new(source, func(source), duration, easing);
                }
                Command::ResetTransform {
                    target,
                    layer,
                    duration,
                    easing,
                } => self.reset(target, layer, duration, easing),
                Command::ClearTransforms => {
                    self.image_transforms.clear();
                    self.audio_transforms.clear();
                    self.root_image = Tweened::default();
                    self.root_audio = Tweened::default();
                    self.blend_modes.clear();
                }
                Command::Stop => break,
            }
        }
        tracing::info!(format = self.format.name, "frame mixer stopped");
    }

    fn transform_entry(
        &mut self,
        target: TransformTarget,
        layer: Option<i32>,
    ) -> &mut Tweened<FrameTransform> {
        match (target, layer) {
            (TransformTarget::Image, Some(layer)) => {
                self.image_transforms.entry(layer).or_default()
            }
            (TransformTarget::Audio, Some(layer)) => {
                self.audio_transforms.entry(layer).or_default()
            }
            (TransformTarget::Image, None) => &mut self.root_image,
            (TransformTarget::Audio, None) => &mut self.root_audio,
        }
    }

    fn reset(
        &mut self,
        target: TransformTarget,
        layer: Option<i32>,
        duration: u32,
        easing: Easing,
    ) {
        let identity = FrameTransform::default();
        match layer {
            Some(layer) => {
                let entry = self.transform_entry(target, Some(layer));
                *entry = Tweened::new(entry.fetch(), identity, duration, easing);
            }
            None => {
                let table = match target {
                    TransformTarget::Image => &mut self.image_transforms,
                    TransformTarget::Audio => &mut self.audio_transforms,
                };
                for tween in table.values_mut() {
                    *tween = Tweened::new(tween.fetch(), identity, duration, easing);
                }
                let root = self.transform_entry(target, None);
                *root = Tweened::new(root.fetch(), identity, duration, easing);
            }
        }
    }

    fn tick(&mut self, frames: &BTreeMap<i32, Frame>) -> (FinishedFrame, u64, u64) {
        let started = Instant::now();
        let interlaced = self.format.is_interlaced();

        for (&layer, frame) in frames {
            let blend_mode = self.blend_modes.get(&layer).copied().unwrap_or_default();
            self.image_mixer.begin_layer(blend_mode);

            let layer_tween = self.image_transforms.entry(layer).or_default();
            if interlaced {
                let first = self.root_image.fetch_and_tick(1) * layer_tween.fetch_and_tick(1);
                let second = self.root_image.fetch_and_tick(1) * layer_tween.fetch_and_tick(1);
                Frame::interlace(
                    Frame::with_transform(frame.clone(), first),
                    Frame::with_transform(frame.clone(), second),
                    self.format.field_mode,
                )
                .accept(&mut self.image_mixer);
            } else {
                let transform = self.root_image.fetch_and_tick(1) * layer_tween.fetch_and_tick(1);
                Frame::with_transform(frame.clone(), transform).accept(&mut self.image_mixer);
            }

            self.image_mixer.end_layer();
        }

        for (&layer, frame) in frames {
            let layer_tween = self.audio_transforms.entry(layer).or_default();
            if interlaced {
                // One pull per field keeps audio ramps at field rate;
                // the field masks let the mixer discard the duplicate.
                let leading = self.format.field_mode;
                let trailing = if leading == FieldMode::UPPER {
                    FieldMode::LOWER
                } else {
                    FieldMode::UPPER
                };
                let mut first = self.root_audio.fetch_and_tick(1) * layer_tween.fetch_and_tick(1);
                first.field_mode = first.field_mode & leading;
                let mut second = self.root_audio.fetch_and_tick(1) * layer_tween.fetch_and_tick(1);
                second.field_mode = second.field_mode & trailing;

                Frame::with_transform(frame.clone(), first).accept(&mut self.audio_mixer);
                Frame::with_transform(frame.clone(), second).accept(&mut self.audio_mixer);
            } else {
                let transform = self.root_audio.fetch_and_tick(1) * layer_tween.fetch_and_tick(1);
                Frame::with_transform(frame.clone(), transform).accept(&mut self.audio_mixer);
            }
        }

        let render = self.image_mixer.render(&self.format);
        let audio = self.audio_mixer.mix();

        let (image, wait_ms) = match render.wait() {
            Ok(result) => result,
            Err(e) => {
                // A failed render costs one tick; the channel stays up
                // and emits black.
                tracing::warn!(format = self.format.name, "render failed, emitting black: {e}");
                self.diag.record_black_frame();
                (FrameImage::Owned(vec![0u8; self.format.size]), 0)
            }
        };

        // Tween entries for layers gone from the input retire with the
        // tick.
        self.image_transforms
            .retain(|layer, _| frames.contains_key(layer));
        self.audio_transforms
            .retain(|layer, _| frames.contains_key(layer));

        let frame_time_us = started.elapsed().as_micros() as u64;
        (FinishedFrame { image, audio }, frame_time_us, wait_ms)
    }
}
