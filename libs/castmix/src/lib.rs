// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! castmix — the real-time compositing core of a broadcast playout
//! engine.
//!
//! A channel is a [`FrameMixer`] bound to a [`GlDevice`] and a fixed
//! [`VideoFormat`]. Producers hand it a map of layered frames once per
//! tick; it composites them on the GPU with per-layer tweened
//! transforms, blend modes and keying, mixes their audio with
//! volume ramps, and emits one [`FinishedFrame`] per tick through a
//! bounded channel.
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use castmix::{FrameMixer, GlDevice, MixerSettings, VideoFormat};
//!
//! # fn main() -> castmix::Result<()> {
//! let settings = MixerSettings::default();
//! let device = GlDevice::new(&settings)?;
//! let (mixer, frames) = FrameMixer::new(&device, VideoFormat::p1080_25(), &settings)?;
//!
//! mixer.send(BTreeMap::new())?;
//! let frame = frames.recv().unwrap();
//! assert_eq!(frame.image.len(), 1920 * 1080 * 4);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod diag;
pub mod error;
pub mod format;
pub mod frame;
pub mod image;
pub mod ogl;
pub mod pixel;
pub mod transform;
pub mod tween;

mod frame_mixer;

pub use audio::AudioMixer;
pub use config::MixerSettings;
pub use diag::ChannelDiag;
pub use error::{MixerError, Result};
pub use format::{AUDIO_SAMPLE_RATE, FieldMode, VideoFormat};
pub use frame::{DataFrame, Frame, FrameVisitor};
pub use frame_mixer::{FinishedFrame, FrameMixer, FrameReceiver};
pub use image::{BlendMode, FrameImage, ImageMixer, Keyer, RenderResult};
pub use ogl::{BufferUsage, DeviceBuffer, GlDevice, HostBuffer};
pub use pixel::{PixelFormat, PixelFormatDesc, PlaneDesc};
pub use transform::{FrameTransform, Levels};
pub use tween::{Easing, Tweened};
