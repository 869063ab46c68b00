// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The image mixer.
//!
//! Consumes one tick's frame tree through the visitor, schedules the
//! host→device uploads, and renders layer by layer on the GL thread.
//! Within a layer, items interact through the keying protocol: a key
//! item renders an alpha mask into the local key buffer, a mix item
//! draws additively into the layer's mix buffer consuming that mask,
//! and a normal item flushes the mix buffer and draws directly, also
//! consuming the mask. A layer's final local key becomes the *next*
//! layer's layer key.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use super::blend::{BlendMode, Keyer};
use super::kernel::{DrawParams, ImageKernel};
use crate::config::MixerSettings;
use crate::error::{MixerError, Result};
use crate::format::{FieldMode, VideoFormat};
use crate::frame::{DataFrame, FrameVisitor};
use crate::ogl::{BufferUsage, DeviceBuffer, GlDevice, HostBuffer, TaskFuture, TaskPriority};
use crate::pixel::{PixelFormat, PixelFormatDesc};
use crate::transform::FrameTransform;

/// A host→device upload that several items may share when they
/// reference the same host buffer. Resolved once, on the GL thread.
#[derive(Clone)]
struct SharedTexture(Arc<Mutex<SharedTextureState>>);

enum SharedTextureState {
    Pending(Option<TaskFuture<Result<Arc<DeviceBuffer>>>>),
    Ready(Arc<DeviceBuffer>),
    Failed(String),
}

impl SharedTexture {
    fn new(future: TaskFuture<Result<Arc<DeviceBuffer>>>) -> Self {
        Self(Arc::new(Mutex::new(SharedTextureState::Pending(Some(
            future,
        )))))
    }

    fn get(&self) -> Result<Arc<DeviceBuffer>> {
        let mut state = self.0.lock();
        match &mut *state {
            SharedTextureState::Ready(texture) => Ok(Arc::clone(texture)),
            SharedTextureState::Failed(message) => {
                Err(MixerError::ResourceExhausted(message.clone()))
            }
            SharedTextureState::Pending(future) => {
                let future = future.take().expect("pending upload polled once");
                match future.wait().and_then(|r| r) {
                    Ok(texture) => {
                        *state = SharedTextureState::Ready(Arc::clone(&texture));
                        Ok(texture)
                    }
                    Err(e) => {
                        let message = e.to_string();
                        *state = SharedTextureState::Failed(message.clone());
                        Err(e)
                    }
                }
            }
        }
    }
}

#[derive(Clone)]
struct Item {
    pix_desc: PixelFormatDesc,
    buffers: Vec<Arc<HostBuffer>>,
    textures: Vec<SharedTexture>,
    transform: FrameTransform,
}

#[derive(Clone)]
struct Layer {
    blend_mode: BlendMode,
    items: Vec<Item>,
}

/// The finished image of a tick: either CPU bytes from a fast path or a
/// mapped readback buffer whose bytes stay valid while it is held.
pub enum FrameImage {
    Owned(Vec<u8>),
    Mapped(Arc<HostBuffer>),
}

impl FrameImage {
    pub fn bytes(&self) -> &[u8] {
        match self {
            FrameImage::Owned(bytes) => bytes,
            FrameImage::Mapped(buffer) => buffer.mapped().unwrap_or(&[]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FrameImage::Owned(bytes) => bytes.len(),
            FrameImage::Mapped(buffer) => buffer.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deferred readback. Fence wait and host mapping happen in [`wait`],
/// as late as possible.
///
/// [`wait`]: RenderResult::wait
pub struct RenderResult {
    inner: RenderResultInner,
}

enum RenderResultInner {
    Ready(Vec<u8>),
    Pending {
        future: TaskFuture<Result<Arc<HostBuffer>>>,
        device: GlDevice,
    },
}

impl RenderResult {
    fn ready(bytes: Vec<u8>) -> Self {
        Self {
            inner: RenderResultInner::Ready(bytes),
        }
    }

    /// Milliseconds spent waiting on the GPU fence, for diagnostics.
    /// Zero on the CPU fast paths.
    pub fn wait(self) -> Result<(FrameImage, u64)> {
        match self.inner {
            RenderResultInner::Ready(bytes) => Ok((FrameImage::Owned(bytes), 0)),
            RenderResultInner::Pending { future, device } => {
                let buffer = future.wait()??;
                let stalled_ms = device.wait_for(&buffer);
                device.map_for_read(&buffer)?;
                Ok((FrameImage::Mapped(buffer), stalled_ms))
            }
        }
    }
}

pub struct ImageMixer {
    device: GlDevice,
    kernel: Arc<ImageKernel>,
    transform_stack: Vec<FrameTransform>,
    layers: Vec<Layer>,
}

impl ImageMixer {
    pub fn new(device: &GlDevice, settings: &MixerSettings) -> Result<Self> {
        let kernel = Arc::new(ImageKernel::new(device, settings.blend_modes)?);
        Ok(Self {
            device: device.clone(),
            kernel,
            transform_stack: vec![FrameTransform::default()],
            layers: Vec::new(),
        })
    }

    /// Open a new layer; subsequent visits accumulate into it.
    pub fn begin_layer(&mut self, blend_mode: BlendMode) {
        self.layers.push(Layer {
            blend_mode,
            items: Vec::new(),
        });
    }

    pub fn end_layer(&mut self) {}

    /// Allocate a producer-fillable frame: one mapped write-only host
    /// buffer per plane.
    pub fn create_frame(&self, tag: u64, pix_desc: PixelFormatDesc) -> Result<DataFrame> {
        DataFrame::alloc(&self.device, tag, pix_desc)
    }

    /// Consume the accumulated layers and kick off the render. The
    /// heavy work happens on the GL thread; the caller gets a deferred
    /// readback.
    pub fn render(&mut self, format: &VideoFormat) -> RenderResult {
        let mut layers = std::mem::take(&mut self.layers);
        layers.retain(|layer| !layer.items.is_empty());

        if layers.is_empty() {
            return RenderResult::ready(vec![0u8; format.size]);
        }

        if let Some(bytes) = self.try_bypass(&layers, format) {
            return RenderResult::ready(bytes);
        }

        self.schedule_uploads(&mut layers);

        let device = self.device.clone();
        let kernel = Arc::clone(&self.kernel);
        let format = format.clone();
        let future = self
            .device
            .executor()
            .submit(TaskPriority::Normal, move || {
                Renderer {
                    device: &device,
                    kernel: &kernel,
                    format: &format,
                }
                .render(layers)
            });

        RenderResult {
            inner: RenderResultInner::Pending {
                future,
                device: self.device.clone(),
            },
        }
    }

    /// One BGRA item at channel size with identity transform and normal
    /// blending needs no GPU at all: copy its host bytes straight out.
    fn try_bypass(&self, layers: &[Layer], format: &VideoFormat) -> Option<Vec<u8>> {
        if layers.len() != 1 || layers[0].items.len() != 1 {
            return None;
        }
        if self.kernel.has_blend_modes() && layers[0].blend_mode != BlendMode::Normal {
            return None;
        }
        let item = &layers[0].items[0];
        if item.pix_desc.format != PixelFormat::Bgra {
            return None;
        }
        let source = item.buffers.first()?;
        if source.size() != format.size || item.transform != FrameTransform::default() {
            return None;
        }
        source.mapped().map(<[u8]>::to_vec)
    }

    /// Start every distinct host buffer's upload exactly once.
    fn schedule_uploads(&self, layers: &mut [Layer]) {
        let mut uploads: AHashMap<usize, SharedTexture> = AHashMap::new();
        for layer in layers.iter_mut() {
            for item in &mut layer.items {
                for (index, host) in item.buffers.iter().enumerate() {
                    let plane = &item.pix_desc.planes[index];
                    let texture = uploads
                        .entry(Arc::as_ptr(host) as usize)
                        .or_insert_with(|| {
                            SharedTexture::new(self.device.copy_async(
                                host,
                                plane.width,
                                plane.height,
                                plane.channels,
                            ))
                        });
                    item.textures.push(texture.clone());
                }
                item.buffers.clear();
            }
        }
    }
}

impl FrameVisitor for ImageMixer {
    fn begin(&mut self, transform: &FrameTransform) {
        let top = *self.transform_stack.last().expect("transform stack root");
        self.transform_stack.push(top * *transform);
    }

    fn visit(&mut self, frame: &DataFrame) {
        let top = *self.transform_stack.last().expect("transform stack root");
        if !frame.pix_desc().is_valid() || frame.planes().is_empty() {
            return;
        }
        if top.field_mode == FieldMode::EMPTY {
            return;
        }
        let Some(layer) = self.layers.last_mut() else {
            debug_assert!(false, "visit outside begin_layer");
            return;
        };

        let mut transform = top;
        // Volume belongs to the audio mixer.
        transform.volume = FrameTransform::default().volume;

        layer.items.push(Item {
            pix_desc: frame.pix_desc().clone(),
            buffers: frame.planes().to_vec(),
            textures: Vec::new(),
            transform,
        });
    }

    fn end(&mut self) {
        self.transform_stack.pop();
    }
}

/// GL-thread side of a render: draws layers into the channel-sized
/// draw buffer and arms the readback.
struct Renderer<'a> {
    device: &'a GlDevice,
    kernel: &'a ImageKernel,
    format: &'a VideoFormat,
}

impl Renderer<'_> {
    fn render(&self, layers: Vec<Layer>) -> Result<Arc<HostBuffer>> {
        let draw_buffer = self.create_mixer_buffer(4)?;

        if self.format.is_interlaced() {
            // Same layers twice, each pass masked to its field.
            let mut upper = layers.clone();
            let mut lower = layers;
            for layer in &mut upper {
                for item in &mut layer.items {
                    item.transform.field_mode = item.transform.field_mode & FieldMode::UPPER;
                }
            }
            for layer in &mut lower {
                for item in &mut layer.items {
                    item.transform.field_mode = item.transform.field_mode & FieldMode::LOWER;
                }
            }
            self.draw(upper, &draw_buffer)?;
            self.draw(lower, &draw_buffer)?;
        } else {
            self.draw(layers, &draw_buffer)?;
        }

        let readback = self
            .device
            .create_host_buffer(self.format.size, BufferUsage::ReadOnly)?;
        draw_buffer.copy_to(&readback, self.device)?;
        Ok(readback)
    }

    fn draw(&self, layers: Vec<Layer>, draw_buffer: &Arc<DeviceBuffer>) -> Result<()> {
        let mut layer_key_buffer: Option<Arc<DeviceBuffer>> = None;
        for layer in layers {
            self.draw_layer(layer, draw_buffer, &mut layer_key_buffer)?;
        }
        Ok(())
    }

    fn draw_layer(
        &self,
        mut layer: Layer,
        draw_buffer: &Arc<DeviceBuffer>,
        layer_key_buffer: &mut Option<Arc<DeviceBuffer>>,
    ) -> Result<()> {
        layer
            .items
            .retain(|item| item.transform.field_mode != FieldMode::EMPTY);
        if layer.items.is_empty() {
            // Field masking can empty a layer in one pass; the
            // inherited layer key then carries over untouched.
            return Ok(());
        }

        let mut local_key_buffer: Option<Arc<DeviceBuffer>> = None;
        let mut local_mix_buffer: Option<Arc<DeviceBuffer>> = None;

        if layer.blend_mode != BlendMode::Normal && self.kernel.has_blend_modes() {
            // Blended layers compose in isolation first, then fold onto
            // the channel with their blend mode.
            let layer_draw_buffer = self.create_mixer_buffer(4)?;
            for item in layer.items {
                self.draw_item(
                    item,
                    &layer_draw_buffer,
                    layer_key_buffer,
                    &mut local_key_buffer,
                    &mut local_mix_buffer,
                )?;
            }
            self.flush_mix(&layer_draw_buffer, local_mix_buffer.take())?;
            self.compose(draw_buffer, layer_draw_buffer, layer.blend_mode)?;
        } else {
            for item in layer.items {
                self.draw_item(
                    item,
                    draw_buffer,
                    layer_key_buffer,
                    &mut local_key_buffer,
                    &mut local_mix_buffer,
                )?;
            }
            self.flush_mix(draw_buffer, local_mix_buffer.take())?;
        }

        // Keys propagate forward: this layer's mask keys the next layer.
        *layer_key_buffer = local_key_buffer;
        Ok(())
    }

    fn draw_item(
        &self,
        item: Item,
        draw_buffer: &Arc<DeviceBuffer>,
        layer_key_buffer: &Option<Arc<DeviceBuffer>>,
        local_key_buffer: &mut Option<Arc<DeviceBuffer>>,
        local_mix_buffer: &mut Option<Arc<DeviceBuffer>>,
    ) -> Result<()> {
        let mut textures = Vec::with_capacity(item.textures.len());
        for texture in &item.textures {
            textures.push(texture.get()?);
        }

        if item.transform.is_key {
            if local_key_buffer.is_none() {
                *local_key_buffer = Some(self.create_mixer_buffer(1)?);
            }
            let background = Arc::clone(local_key_buffer.as_ref().expect("just created"));
            self.kernel.draw(DrawParams {
                pix_desc: item.pix_desc,
                textures,
                transform: item.transform,
                blend_mode: BlendMode::Normal,
                keyer: Keyer::Linear,
                background,
                local_key: None,
                layer_key: None,
            })
        } else if item.transform.is_mix {
            if local_mix_buffer.is_none() {
                *local_mix_buffer = Some(self.create_mixer_buffer(4)?);
            }
            let background = Arc::clone(local_mix_buffer.as_ref().expect("just created"));
            self.kernel.draw(DrawParams {
                pix_desc: item.pix_desc,
                textures,
                transform: item.transform,
                blend_mode: BlendMode::Normal,
                keyer: Keyer::Additive,
                background,
                local_key: local_key_buffer.take(),
                layer_key: layer_key_buffer.clone(),
            })
        } else {
            self.flush_mix(draw_buffer, local_mix_buffer.take())?;
            self.kernel.draw(DrawParams {
                pix_desc: item.pix_desc,
                textures,
                transform: item.transform,
                blend_mode: BlendMode::Normal,
                keyer: Keyer::Linear,
                background: Arc::clone(draw_buffer),
                local_key: local_key_buffer.take(),
                layer_key: layer_key_buffer.clone(),
            })
        }
    }

    /// Fold an accumulated mix buffer onto `target` with normal
    /// blending.
    fn flush_mix(
        &self,
        target: &Arc<DeviceBuffer>,
        mix_buffer: Option<Arc<DeviceBuffer>>,
    ) -> Result<()> {
        let Some(mix_buffer) = mix_buffer else {
            return Ok(());
        };
        self.kernel.draw(DrawParams::composite(
            mix_buffer,
            Arc::clone(target),
            BlendMode::Normal,
        ))
    }

    fn compose(
        &self,
        target: &Arc<DeviceBuffer>,
        source: Arc<DeviceBuffer>,
        blend_mode: BlendMode,
    ) -> Result<()> {
        self.kernel
            .draw(DrawParams::composite(source, Arc::clone(target), blend_mode))
    }

    fn create_mixer_buffer(&self, stride: usize) -> Result<Arc<DeviceBuffer>> {
        let buffer =
            self.device
                .create_device_buffer(self.format.width, self.format.height, stride)?;
        self.device.clear(&buffer);
        Ok(buffer)
    }
}
