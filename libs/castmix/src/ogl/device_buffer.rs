// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! GPU textures.
//!
//! A texture's shape `(width, height, stride)` is fixed for its whole
//! life; that is what makes recycling by shape key safe.

use std::sync::Arc;

use gl::types::GLuint;

use super::device::GlDevice;
use super::fence::Fence;
use super::host_buffer::PixelBuffer;
use crate::error::{MixerError, Result};

/// External format and internal storage for each stride.
const FORMATS: [u32; 5] = [0, gl::RED, gl::RG, gl::BGR, gl::BGRA];
const INTERNAL_FORMATS: [u32; 5] = [0, gl::R8, gl::RG8, gl::RGB8, gl::RGBA8];

pub struct Texture {
    id: GLuint,
    width: usize,
    height: usize,
    stride: usize,
    fence: Fence,
}

unsafe impl Send for Texture {}
unsafe impl Sync for Texture {}

impl Texture {
    /// Allocate texture storage. GL thread only. Allocation failure is
    /// recoverable — the device GCs its pools and retries once.
    pub(crate) fn new(width: usize, height: usize, stride: usize) -> Result<Self> {
        debug_assert!((1..=4).contains(&stride));
        debug_assert!(width > 0 && height > 0);
        if !(1..=4).contains(&stride) || width == 0 || height == 0 {
            return Err(MixerError::InvalidArgument("bad texture shape"));
        }

        let mut id = 0;
        unsafe {
            gl::GenTextures(1, &mut id);
            gl::BindTexture(gl::TEXTURE_2D, id);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                INTERNAL_FORMATS[stride] as i32,
                width as i32,
                height as i32,
                0,
                FORMATS[stride],
                gl::UNSIGNED_BYTE,
                std::ptr::null(),
            );
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        super::context::check_gl("texture allocation").map_err(|e| {
            unsafe { gl::DeleteTextures(1, &id) };
            MixerError::ResourceExhausted(format!("{width}x{height}x{stride} texture: {e}"))
        })?;
        tracing::trace!(width, height, stride, "allocated texture");
        Ok(Self {
            id,
            width,
            height,
            stride,
            fence: Fence::new(),
        })
    }

    pub(crate) fn id(&self) -> GLuint {
        self.id
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Bind to a texture sampler unit. GL thread only.
    pub fn bind(&self, unit: u32) {
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0 + unit);
            gl::BindTexture(gl::TEXTURE_2D, self.id);
        }
    }

    pub fn unbind(&self, unit: u32) {
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0 + unit);
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
    }

    /// Upload from a host buffer's pixel-unpack binding and arm the
    /// completion fence. GL thread only.
    pub fn copy_from(&self, source: &PixelBuffer) -> Result<()> {
        source.unmap();
        source.bind();
        unsafe {
            gl::BindTexture(gl::TEXTURE_2D, self.id);
            gl::TexSubImage2D(
                gl::TEXTURE_2D,
                0,
                0,
                0,
                self.width as i32,
                self.height as i32,
                FORMATS[self.stride],
                gl::UNSIGNED_BYTE,
                std::ptr::null(),
            );
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        source.unbind();
        self.fence.arm();
        super::context::check_gl("texture upload")
    }

    /// Arm a readback of this texture into `target`. GL thread only.
    pub fn copy_to(&self, target: &PixelBuffer, device: &GlDevice) -> Result<()> {
        device.attach(self);
        target.begin_read(self.width, self.height)
    }

    /// Whether the last transfer into this texture has completed. GL
    /// thread only.
    pub fn ready(&self) -> bool {
        self.fence.ready()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        // Reached on the GL thread via GC or device teardown.
        unsafe { gl::DeleteTextures(1, &self.id) };
    }
}

/// Pooled handle to a [`Texture`]; the last drop pushes the texture back
/// into its shape's pool queue.
pub struct DeviceBuffer {
    texture: Option<Texture>,
    pool: Arc<crossbeam_queue::SegQueue<Texture>>,
}

impl DeviceBuffer {
    pub(crate) fn pooled(texture: Texture, pool: Arc<crossbeam_queue::SegQueue<Texture>>) -> Self {
        Self {
            texture: Some(texture),
            pool,
        }
    }
}

impl std::ops::Deref for DeviceBuffer {
    type Target = Texture;
    fn deref(&self) -> &Texture {
        self.texture.as_ref().expect("texture present until drop")
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if let Some(texture) = self.texture.take() {
            self.pool.push(texture);
        }
    }
}
