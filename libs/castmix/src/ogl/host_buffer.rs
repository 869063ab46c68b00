// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Host-side transfer buffers (pixel buffer objects).
//!
//! A write-only buffer is the staging area a producer fills before the
//! device uploads it; it lives mapped except while a transfer is in
//! flight. A read-only buffer receives framebuffer readbacks and is
//! mapped as late as possible, on the GL thread, when a consumer
//! finally asks for the bytes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use gl::types::GLuint;

use super::executor::{GlExecutor, TaskPriority};
use super::fence::Fence;
use crate::error::{MixerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Pixel-unpack staging for uploads. Pooled instances stay mapped.
    WriteOnly,
    /// Pixel-pack destination for readbacks. Pooled instances stay
    /// unmapped.
    ReadOnly,
}

/// A raw pixel buffer object. All GL calls on it belong to the GL
/// thread; the mapped pointer itself may be read or written from any
/// thread.
pub struct PixelBuffer {
    id: GLuint,
    size: usize,
    usage: BufferUsage,
    data: AtomicPtr<u8>,
    fence: Fence,
}

unsafe impl Send for PixelBuffer {}
unsafe impl Sync for PixelBuffer {}

impl PixelBuffer {
    /// Allocate the buffer object. GL thread only.
    pub(crate) fn new(size: usize, usage: BufferUsage) -> Result<Self> {
        debug_assert!(size > 0);
        if size == 0 {
            return Err(MixerError::InvalidArgument("host buffer size must be > 0"));
        }

        let mut id = 0;
        unsafe {
            gl::GenBuffers(1, &mut id);
        }
        if id == 0 {
            return Err(MixerError::ResourceExhausted("glGenBuffers failed".into()));
        }

        let buffer = Self {
            id,
            size,
            usage,
            data: AtomicPtr::new(std::ptr::null_mut()),
            fence: Fence::new(),
        };
        unsafe {
            gl::BindBuffer(buffer.target(), id);
            gl::BufferData(
                buffer.target(),
                size as isize,
                std::ptr::null(),
                buffer.gl_usage(),
            );
            gl::BindBuffer(buffer.target(), 0);
        }
        super::context::check_gl("host buffer allocation")?;
        tracing::trace!(size, ?usage, "allocated host buffer");
        Ok(buffer)
    }

    fn target(&self) -> u32 {
        match self.usage {
            BufferUsage::WriteOnly => gl::PIXEL_UNPACK_BUFFER,
            BufferUsage::ReadOnly => gl::PIXEL_PACK_BUFFER,
        }
    }

    fn gl_usage(&self) -> u32 {
        match self.usage {
            BufferUsage::WriteOnly => gl::STREAM_DRAW,
            BufferUsage::ReadOnly => gl::STREAM_READ,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Map the buffer into client memory. GL thread only. Write-only
    /// buffers orphan their previous storage first, so the driver never
    /// stalls on a still-in-flight upload.
    pub fn map(&self) -> Result<()> {
        if !self.data.load(Ordering::Acquire).is_null() {
            return Ok(());
        }
        let access = match self.usage {
            BufferUsage::WriteOnly => gl::WRITE_ONLY,
            BufferUsage::ReadOnly => gl::READ_ONLY,
        };
        let ptr = unsafe {
            gl::BindBuffer(self.target(), self.id);
            if self.usage == BufferUsage::WriteOnly {
                gl::BufferData(
                    self.target(),
                    self.size as isize,
                    std::ptr::null(),
                    self.gl_usage(),
                );
            }
            let ptr = gl::MapBuffer(self.target(), access);
            gl::BindBuffer(self.target(), 0);
            ptr
        };
        if ptr.is_null() {
            return Err(MixerError::Gl("glMapBuffer returned null".into()));
        }
        self.data.store(ptr.cast(), Ordering::Release);
        Ok(())
    }

    /// Release the client mapping. GL thread only.
    pub fn unmap(&self) {
        if self.data.load(Ordering::Acquire).is_null() {
            return;
        }
        unsafe {
            gl::BindBuffer(self.target(), self.id);
            gl::UnmapBuffer(self.target());
            gl::BindBuffer(self.target(), 0);
        }
        self.data.store(std::ptr::null_mut(), Ordering::Release);
    }

    pub(crate) fn bind(&self) {
        unsafe { gl::BindBuffer(self.target(), self.id) };
    }

    pub(crate) fn unbind(&self) {
        unsafe { gl::BindBuffer(self.target(), 0) };
    }

    /// Snapshot the currently attached framebuffer into this buffer and
    /// arm the completion fence. GL thread only.
    pub fn begin_read(&self, width: usize, height: usize) -> Result<()> {
        self.unmap();
        self.bind();
        unsafe {
            gl::ReadPixels(
                0,
                0,
                width as i32,
                height as i32,
                gl::BGRA,
                gl::UNSIGNED_BYTE,
                std::ptr::null_mut(),
            );
        }
        self.unbind();
        self.fence.arm();
        super::context::check_gl("framebuffer readback")
    }

    /// Whether the last transfer into this buffer has completed. GL
    /// thread only.
    pub fn ready(&self) -> bool {
        self.fence.ready()
    }

    /// Bytes of the mapped region, if mapped.
    pub fn mapped(&self) -> Option<&[u8]> {
        let ptr = self.data.load(Ordering::Acquire);
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { std::slice::from_raw_parts(ptr, self.size) })
        }
    }

    /// Copy `src` into the mapped region. The caller is the single
    /// producer writing this buffer for the current tick.
    pub fn write(&self, src: &[u8]) -> Result<()> {
        let ptr = self.data.load(Ordering::Acquire);
        if ptr.is_null() {
            return Err(MixerError::InvalidArgument("host buffer is not mapped"));
        }
        if src.len() > self.size {
            return Err(MixerError::InvalidArgument("write exceeds buffer size"));
        }
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), ptr, src.len()) };
        Ok(())
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        // Reached on the GL thread via GC or device teardown.
        unsafe { gl::DeleteBuffers(1, &self.id) };
    }
}

/// Pooled handle to a [`PixelBuffer`]. On the last drop the buffer goes
/// back to its `(usage, size)` pool after a High-priority GL task pays
/// the map (write-only) or unmap (read-only) cost there.
pub struct HostBuffer {
    buffer: Option<PixelBuffer>,
    pool: Arc<crossbeam_queue::SegQueue<PixelBuffer>>,
    exec: GlExecutor,
}

impl HostBuffer {
    pub(crate) fn pooled(
        buffer: PixelBuffer,
        pool: Arc<crossbeam_queue::SegQueue<PixelBuffer>>,
        exec: GlExecutor,
    ) -> Self {
        Self {
            buffer: Some(buffer),
            pool,
            exec,
        }
    }
}

impl std::ops::Deref for HostBuffer {
    type Target = PixelBuffer;
    fn deref(&self) -> &PixelBuffer {
        self.buffer.as_ref().expect("host buffer present until drop")
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };
        let pool = Arc::clone(&self.pool);
        self.exec.submit(TaskPriority::High, move || {
            match buffer.usage() {
                BufferUsage::WriteOnly => {
                    if let Err(e) = buffer.map() {
                        // An unmappable buffer must not re-enter the
                        // pool; let it delete here instead.
                        tracing::warn!("discarding host buffer: {e}");
                        return;
                    }
                }
                BufferUsage::ReadOnly => buffer.unmap(),
            }
            pool.push(buffer);
        });
    }
}

static STALL_WARNED: AtomicBool = AtomicBool::new(false);

/// Poll a host buffer's fence from off the GL thread with escalating
/// patience: one High-priority probe, then Normal-priority probes every
/// 4 ms up to `stall_ms`. A stall past the threshold logs one warning
/// per process; it is a diagnostic, not an error.
pub(crate) fn wait_ready(buffer: &Arc<HostBuffer>, exec: &GlExecutor, stall_ms: u64) -> u64 {
    const POLL_MS: u64 = 4;

    let probe = |priority| {
        let buffer = Arc::clone(buffer);
        exec.invoke(priority, move || buffer.ready()).unwrap_or(true)
    };

    if probe(TaskPriority::High) {
        return 0;
    }

    let mut waited = 0;
    while !probe(TaskPriority::Normal) && waited < stall_ms {
        std::thread::sleep(std::time::Duration::from_millis(POLL_MS));
        waited += POLL_MS;
    }

    if waited >= stall_ms && !STALL_WARNED.swap(true, Ordering::Relaxed) {
        tracing::warn!(
            waited_ms = waited,
            "GPU was not ready during host read-back; output is falling behind the \
             GPU. Further stalls are reported through channel diagnostics only."
        );
    }
    waited
}
