// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The GPU device: a single-threaded GL executor plus shape-keyed
//! buffer pools shared by every channel rendering on it.
//!
//! All texture and transfer-buffer traffic goes through here. Pool
//! misses allocate at High priority on the GL thread; an allocation
//! failure empties the pools and retries once before surfacing
//! `ResourceExhausted`.

use std::cell::RefCell;
use std::sync::Arc;

use crossbeam_channel::bounded;
use gl::types::GLuint;
use parking_lot::Mutex;

use super::context::{GlContext, check_gl};
use super::device_buffer::{DeviceBuffer, Texture};
use super::executor::{GlExecutor, TaskFuture, TaskPriority};
use super::host_buffer::{BufferUsage, HostBuffer, PixelBuffer};
use super::pool::KeyedPool;
use super::shader::Shader;
use crate::config::MixerSettings;
use crate::error::{MixerError, Result};
use crate::format::FieldMode;

thread_local! {
    // The EGL context lives and dies on the GL thread.
    static THREAD_CONTEXT: RefCell<Option<GlContext>> = const { RefCell::new(None) };
}

/// Scanline mask for fielded draws. The integer values are shader ABI
/// (`field_mask` uniform).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FieldMask {
    All = 0,
    /// Even scanlines only.
    Upper = 1,
    /// Odd scanlines only.
    Lower = 2,
}

impl FieldMask {
    pub fn from_field_mode(mode: FieldMode) -> Self {
        if mode == FieldMode::UPPER {
            FieldMask::Upper
        } else if mode == FieldMode::LOWER {
            FieldMask::Lower
        } else {
            FieldMask::All
        }
    }
}

struct GlState {
    fbo: GLuint,
    vao: GLuint,
    attached_texture: GLuint,
    active_program: GLuint,
    viewport: [i32; 4],
    scissor: [i32; 4],
    scissor_enabled: bool,
    blend_func: [i32; 4],
    field_mask: FieldMask,
}

struct DeviceInner {
    executor: GlExecutor,
    device_pools: Arc<KeyedPool<(usize, u64), Texture>>,
    host_pools: Arc<KeyedPool<(BufferUsage, usize), PixelBuffer>>,
    state: Arc<Mutex<GlState>>,
    stall_ms: u64,
}

/// Cheaply clonable handle to the GPU device.
#[derive(Clone)]
pub struct GlDevice {
    inner: Arc<DeviceInner>,
}

impl GlDevice {
    /// Bring up the GL thread, the headless context, and the empty
    /// pools. Fails if no usable GL 3.3 context can be created.
    pub fn new(settings: &MixerSettings) -> Result<Self> {
        let (init_tx, init_rx) = bounded::<(String, GLuint, GLuint)>(1);

        let executor = GlExecutor::spawn("ogl-device", move || {
            let context = GlContext::new()?;
            let description = context.description();

            let mut fbo = 0;
            let mut vao = 0;
            unsafe {
                gl::GenFramebuffers(1, &mut fbo);
                gl::BindFramebuffer(gl::FRAMEBUFFER, fbo);
                gl::GenVertexArrays(1, &mut vao);
                gl::BindVertexArray(vao);
                gl::Disable(gl::DEPTH_TEST);
                // Compositing happens per-draw: either in the shader
                // (blend-mode variant, ONE/ZERO raster state) or via the
                // keyer's fixed-function blend func.
                gl::Enable(gl::BLEND);
                gl::ClearColor(0.0, 0.0, 0.0, 0.0);
            }
            check_gl("device init")?;

            THREAD_CONTEXT.with(|slot| *slot.borrow_mut() = Some(context));
            let _ = init_tx.send((description, fbo, vao));
            Ok(())
        })?;

        let (description, fbo, vao) = init_rx
            .recv()
            .map_err(|_| MixerError::Context("GL thread died during init".into()))?;
        tracing::info!("Initialized OpenGL device: {description}");

        Ok(Self {
            inner: Arc::new(DeviceInner {
                executor,
                device_pools: Arc::new(KeyedPool::new()),
                host_pools: Arc::new(KeyedPool::new()),
                state: Arc::new(Mutex::new(GlState {
                    fbo,
                    vao,
                    attached_texture: 0,
                    active_program: 0,
                    viewport: [0; 4],
                    scissor: [0; 4],
                    scissor_enabled: false,
                    blend_func: [0; 4],
                    field_mask: FieldMask::All,
                })),
                stall_ms: settings.stall_warning_ms,
            }),
        })
    }

    pub(crate) fn executor(&self) -> &GlExecutor {
        &self.inner.executor
    }

    pub fn is_gl_thread(&self) -> bool {
        self.inner.executor.is_gl_thread()
    }

    /// Let queued High-priority work through; callable from GL-thread
    /// tasks between draws.
    pub fn yield_now(&self) {
        self.inner.executor.yield_now();
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    /// Acquire a texture of the given shape, recycling when the pool has
    /// one.
    pub fn create_device_buffer(
        &self,
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<Arc<DeviceBuffer>> {
        debug_assert!((1..=4).contains(&stride), "stride out of range");
        debug_assert!(width > 0 && height > 0, "zero-sized device buffer");
        if !(1..=4).contains(&stride) || width == 0 || height == 0 {
            return Err(MixerError::InvalidArgument("bad device buffer shape"));
        }

        let key = (stride, ((width as u64) << 16) | (height as u64));
        let queue = self.inner.device_pools.queue(key);
        let texture = match queue.pop() {
            Some(texture) => texture,
            None => {
                let device = self.clone();
                self.inner.executor.invoke(TaskPriority::High, move || {
                    device.allocate_texture(width, height, stride)
                })??
            }
        };
        Ok(Arc::new(DeviceBuffer::pooled(texture, queue)))
    }

    /// Acquire a host transfer buffer. Pooled write-only buffers come
    /// back mapped; read-only ones unmapped.
    pub fn create_host_buffer(&self, size: usize, usage: BufferUsage) -> Result<Arc<HostBuffer>> {
        debug_assert!(size > 0, "zero-sized host buffer");
        if size == 0 {
            return Err(MixerError::InvalidArgument("bad host buffer size"));
        }

        let queue = self.inner.host_pools.queue((usage, size));
        let buffer = match queue.pop() {
            Some(buffer) => buffer,
            None => {
                let device = self.clone();
                self.inner.executor.invoke(TaskPriority::High, move || {
                    device.allocate_pixel_buffer(size, usage)
                })??
            }
        };
        Ok(Arc::new(HostBuffer::pooled(
            buffer,
            queue,
            self.inner.executor.clone(),
        )))
    }

    /// Start a host→device upload; the future resolves to the uploaded
    /// texture.
    pub fn copy_async(
        &self,
        source: &Arc<HostBuffer>,
        width: usize,
        height: usize,
        stride: usize,
    ) -> TaskFuture<Result<Arc<DeviceBuffer>>> {
        let device = self.clone();
        let source = Arc::clone(source);
        self.inner.executor.submit(TaskPriority::High, move || {
            let buffer = device.create_device_buffer(width, height, stride)?;
            buffer.copy_from(&source)?;
            Ok(buffer)
        })
    }

    /// Empty every pool on the GL thread. Idempotent; also runs
    /// automatically when an allocation fails.
    pub fn gc(&self) -> TaskFuture<()> {
        let device = self.clone();
        self.inner
            .executor
            .submit(TaskPriority::High, move || device.gc_inline())
    }

    /// Idle textures across all pools (diagnostic).
    pub fn idle_device_buffers(&self) -> usize {
        self.inner.device_pools.idle_count()
    }

    /// Idle host buffers across all pools (diagnostic).
    pub fn idle_host_buffers(&self) -> usize {
        self.inner.host_pools.idle_count()
    }

    fn gc_inline(&self) {
        debug_assert!(self.is_gl_thread());
        tracing::info!("ogl: running GC");
        self.inner.device_pools.clear(drop);
        self.inner.host_pools.clear(drop);
    }

    fn allocate_texture(&self, width: usize, height: usize, stride: usize) -> Result<Texture> {
        match Texture::new(width, height, stride) {
            Ok(texture) => Ok(texture),
            Err(_) => {
                // Let pending pool returns land, then free everything
                // and try again.
                self.inner.executor.yield_now();
                self.gc_inline();
                Texture::new(width, height, stride).map_err(|e| {
                    tracing::error!("ogl: create_device_buffer failed after GC: {e}");
                    MixerError::ResourceExhausted(format!(
                        "{width}x{height}x{stride} texture unavailable"
                    ))
                })
            }
        }
    }

    fn allocate_pixel_buffer(&self, size: usize, usage: BufferUsage) -> Result<PixelBuffer> {
        let prepare = |buffer: PixelBuffer| -> Result<PixelBuffer> {
            if usage == BufferUsage::WriteOnly {
                buffer.map()?;
            }
            Ok(buffer)
        };
        match PixelBuffer::new(size, usage).and_then(prepare) {
            Ok(buffer) => Ok(buffer),
            Err(_) => {
                self.inner.executor.yield_now();
                self.gc_inline();
                PixelBuffer::new(size, usage).and_then(prepare).map_err(|e| {
                    tracing::error!("ogl: create_host_buffer failed after GC: {e}");
                    MixerError::ResourceExhausted(format!("{size} byte host buffer unavailable"))
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Cached GL state (GL thread only)
    // ------------------------------------------------------------------

    /// Attach a texture as the render target.
    pub(crate) fn attach(&self, texture: &Texture) {
        debug_assert!(self.is_gl_thread());
        let mut state = self.inner.state.lock();
        if state.attached_texture != texture.id() {
            unsafe {
                gl::FramebufferTexture2D(
                    gl::FRAMEBUFFER,
                    gl::COLOR_ATTACHMENT0,
                    gl::TEXTURE_2D,
                    texture.id(),
                    0,
                );
            }
            state.attached_texture = texture.id();
        }
    }

    /// Attach and clear a texture to transparent black.
    pub(crate) fn clear(&self, texture: &Texture) {
        self.attach(texture);
        let scissor_enabled = {
            let state = self.inner.state.lock();
            state.scissor_enabled
        };
        // A clear must cover the whole target regardless of scissor.
        if scissor_enabled {
            self.disable_scissor();
        }
        unsafe { gl::Clear(gl::COLOR_BUFFER_BIT) };
    }

    pub(crate) fn use_shader(&self, shader: &Shader) {
        debug_assert!(self.is_gl_thread());
        let mut state = self.inner.state.lock();
        if state.active_program != shader.id() {
            unsafe { gl::UseProgram(shader.id()) };
            state.active_program = shader.id();
        }
    }

    pub(crate) fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        debug_assert!(self.is_gl_thread());
        let mut state = self.inner.state.lock();
        let next = [x, y, width, height];
        if state.viewport != next {
            unsafe { gl::Viewport(x, y, width, height) };
            state.viewport = next;
        }
    }

    pub(crate) fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        debug_assert!(self.is_gl_thread());
        let mut state = self.inner.state.lock();
        if !state.scissor_enabled {
            unsafe { gl::Enable(gl::SCISSOR_TEST) };
            state.scissor_enabled = true;
        }
        let next = [x, y, width, height];
        if state.scissor != next {
            unsafe { gl::Scissor(x, y, width, height) };
            state.scissor = next;
        }
    }

    pub(crate) fn disable_scissor(&self) {
        debug_assert!(self.is_gl_thread());
        let mut state = self.inner.state.lock();
        if state.scissor_enabled {
            unsafe { gl::Disable(gl::SCISSOR_TEST) };
            state.scissor_enabled = false;
        }
    }

    pub(crate) fn blend_func(&self, src: i32, dst: i32, src_alpha: i32, dst_alpha: i32) {
        debug_assert!(self.is_gl_thread());
        let mut state = self.inner.state.lock();
        let next = [src, dst, src_alpha, dst_alpha];
        if state.blend_func != next {
            unsafe {
                gl::BlendFuncSeparate(src as u32, dst as u32, src_alpha as u32, dst_alpha as u32)
            };
            state.blend_func = next;
        }
    }

    /// Set the fielded-draw scanline mask uniform, skipping redundant
    /// updates. Successor of the original stipple-pattern table.
    pub(crate) fn field_mask(&self, mask: FieldMask, shader: &Shader) {
        debug_assert!(self.is_gl_thread());
        let mut state = self.inner.state.lock();
        if state.field_mask != mask {
            shader.set_i32("field_mask", mask as i32);
            state.field_mask = mask;
        }
    }

    // ------------------------------------------------------------------
    // Waiting
    // ------------------------------------------------------------------

    /// Poll a readback buffer's fence to completion with bounded
    /// patience. Returns the milliseconds waited (diagnostic).
    pub(crate) fn wait_for(&self, buffer: &Arc<HostBuffer>) -> u64 {
        super::host_buffer::wait_ready(buffer, &self.inner.executor, self.inner.stall_ms)
    }

    /// Map a readback buffer on the GL thread so its bytes are
    /// reachable from the caller.
    pub(crate) fn map_for_read(&self, buffer: &Arc<HostBuffer>) -> Result<()> {
        let buffer = Arc::clone(buffer);
        self.inner
            .executor
            .invoke(TaskPriority::High, move || buffer.map())?
    }
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        let device_pools = Arc::clone(&self.device_pools);
        let host_pools = Arc::clone(&self.host_pools);
        let state = Arc::clone(&self.state);
        let _ = self.executor.invoke(TaskPriority::High, move || {
            device_pools.clear(drop);
            host_pools.clear(drop);
            {
                let state = state.lock();
                unsafe {
                    gl::DeleteFramebuffers(1, &state.fbo);
                    gl::DeleteVertexArrays(1, &state.vao);
                }
            }
            THREAD_CONTEXT.with(|slot| slot.borrow_mut().take());
        });
        self.executor.stop();
        tracing::info!("Uninitialized OpenGL device");
    }
}
