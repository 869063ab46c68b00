// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use crate::error::Result;
use crate::ogl::{BufferUsage, GlDevice, HostBuffer};
use crate::pixel::{PixelFormat, PixelFormatDesc};
use crate::transform::FrameTransform;

/// A leaf frame: pixel planes in host memory, one tick of audio and the
/// producer's own transform.
///
/// The `tag` identifies the producing source and must stay stable across
/// the producer's lifetime — the audio mixer keys volume-ramp history on
/// it.
pub struct DataFrame {
    tag: u64,
    pix_desc: PixelFormatDesc,
    planes: Vec<Arc<HostBuffer>>,
    audio: Vec<i32>,
    transform: FrameTransform,
}

impl DataFrame {
    pub fn new(tag: u64, pix_desc: PixelFormatDesc, planes: Vec<Arc<HostBuffer>>) -> Self {
        Self {
            tag,
            pix_desc,
            planes,
            audio: Vec::new(),
            transform: FrameTransform::default(),
        }
    }

    /// Allocate a producer-fillable frame: one mapped write-only host
    /// buffer per plane, drawn from the device pools.
    pub fn alloc(device: &GlDevice, tag: u64, pix_desc: PixelFormatDesc) -> Result<Self> {
        let mut planes = Vec::with_capacity(pix_desc.planes.len());
        for plane in &pix_desc.planes {
            planes.push(device.create_host_buffer(plane.size, BufferUsage::WriteOnly)?);
        }
        Ok(Self::new(tag, pix_desc, planes))
    }

    /// A frame carrying only audio samples, no image planes.
    pub fn audio_only(tag: u64, audio: Vec<i32>) -> Self {
        let mut frame = Self::new(tag, PixelFormatDesc::new(PixelFormat::Invalid), Vec::new());
        frame.audio = audio;
        frame
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn pix_desc(&self) -> &PixelFormatDesc {
        &self.pix_desc
    }

    pub fn planes(&self) -> &[Arc<HostBuffer>] {
        &self.planes
    }

    pub fn audio(&self) -> &[i32] {
        &self.audio
    }

    pub fn set_audio(&mut self, audio: Vec<i32>) {
        self.audio = audio;
    }

    pub fn transform(&self) -> &FrameTransform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut FrameTransform {
        &mut self.transform
    }
}
