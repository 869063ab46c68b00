// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The draw kernel: one quad per item, everything else is uniforms.

use std::sync::Arc;

use super::blend::{BlendMode, Keyer};
use super::glsl;
use crate::error::Result;
use crate::ogl::{DeviceBuffer, FieldMask, GlDevice, Shader, TaskPriority};
use crate::pixel::PixelFormatDesc;
use crate::transform::FrameTransform;

const LOCAL_KEY_UNIT: u32 = 4;
const LAYER_KEY_UNIT: u32 = 5;
const BACKGROUND_UNIT: u32 = 6;

/// Everything one draw call consumes. `background` is both the render
/// target and, when blend modes are on, the surface sampled for
/// compositing.
pub struct DrawParams {
    pub pix_desc: PixelFormatDesc,
    pub textures: Vec<Arc<DeviceBuffer>>,
    pub transform: FrameTransform,
    pub blend_mode: BlendMode,
    pub keyer: Keyer,
    pub background: Arc<DeviceBuffer>,
    pub local_key: Option<Arc<DeviceBuffer>>,
    pub layer_key: Option<Arc<DeviceBuffer>>,
}

impl DrawParams {
    /// Plain draw of `texture` onto `background`: BGRA, identity
    /// transform, no keys. Used to fold working buffers together.
    pub fn composite(
        texture: Arc<DeviceBuffer>,
        background: Arc<DeviceBuffer>,
        blend_mode: BlendMode,
    ) -> Self {
        let pix_desc = PixelFormatDesc::bgra(texture.width(), texture.height());
        Self {
            pix_desc,
            textures: vec![texture],
            transform: FrameTransform::default(),
            blend_mode,
            keyer: Keyer::Linear,
            background,
            local_key: None,
            layer_key: None,
        }
    }
}

pub struct ImageKernel {
    device: GlDevice,
    shader: Shader,
    blend_modes: bool,
}

impl ImageKernel {
    /// Compile the image shader on the GL thread. A compile failure is
    /// fatal for the channel.
    pub fn new(device: &GlDevice, blend_modes: bool) -> Result<Self> {
        let fragment = glsl::fragment(blend_modes);
        let shader = device
            .executor()
            .invoke(TaskPriority::High, move || Shader::new(glsl::VERTEX, &fragment))??;
        if !blend_modes {
            tracing::info!("blend modes disabled; using simple compositing shader");
        }
        Ok(Self {
            device: device.clone(),
            shader,
            blend_modes,
        })
    }

    pub fn has_blend_modes(&self) -> bool {
        self.blend_modes
    }

    /// Issue one quad draw. GL thread only.
    pub fn draw(&self, params: DrawParams) -> Result<()> {
        if params.textures.is_empty() {
            return Ok(());
        }

        let device = &self.device;
        let shader = &self.shader;
        let transform = &params.transform;

        device.use_shader(shader);
        device.field_mask(FieldMask::from_field_mode(transform.field_mode), shader);

        for (unit, texture) in params.textures.iter().enumerate() {
            texture.bind(unit as u32);
        }
        if let Some(local_key) = &params.local_key {
            local_key.bind(LOCAL_KEY_UNIT);
        }
        if let Some(layer_key) = &params.layer_key {
            layer_key.bind(LAYER_KEY_UNIT);
        }
        params.background.bind(BACKGROUND_UNIT);
        device.attach(&params.background);

        shader.set_i32("plane[0]", 0);
        shader.set_i32("plane[1]", 1);
        shader.set_i32("plane[2]", 2);
        shader.set_i32("plane[3]", 3);
        shader.set_i32("local_key", LOCAL_KEY_UNIT as i32);
        shader.set_i32("layer_key", LAYER_KEY_UNIT as i32);
        shader.set_i32("background", BACKGROUND_UNIT as i32);
        shader.set_bool("is_hd", params.pix_desc.planes[0].height > 700);
        shader.set_bool("has_local_key", params.local_key.is_some());
        shader.set_bool("has_layer_key", params.layer_key.is_some());
        shader.set_i32("blend_mode", params.blend_mode as i32);
        shader.set_i32("keyer", params.keyer as i32);
        shader.set_i32("pixel_format", params.pix_desc.format as i32);
        shader.set_f32("opacity", transform.opacity);

        let levels = &transform.levels;
        shader.set_bool("levels", levels.is_active());
        if levels.is_active() {
            shader.set_f32("min_input", levels.min_input);
            shader.set_f32("max_input", levels.max_input);
            shader.set_f32("gamma", levels.gamma);
            shader.set_f32("min_output", levels.min_output);
            shader.set_f32("max_output", levels.max_output);
        }

        shader.set_bool("csb", transform.has_csb());
        if transform.has_csb() {
            shader.set_f32("brt", transform.brightness);
            shader.set_f32("sat", transform.saturation);
            shader.set_f32("con", transform.contrast);
        }

        // With the blend catalog compiled in, compositing happens in the
        // shader against the sampled background and the raster output
        // replaces; otherwise fixed-function blending applies the keyer.
        if self.blend_modes {
            device.blend_func(gl::ONE as i32, gl::ZERO as i32, gl::ONE as i32, gl::ZERO as i32);
        } else {
            match params.keyer {
                Keyer::Additive => {
                    device.blend_func(gl::ONE as i32, gl::ONE as i32, gl::ONE as i32, gl::ONE as i32)
                }
                Keyer::Linear => device.blend_func(
                    gl::ONE as i32,
                    gl::ONE_MINUS_SRC_ALPHA as i32,
                    gl::ONE as i32,
                    gl::ONE_MINUS_SRC_ALPHA as i32,
                ),
            }
        }

        let width = params.background.width();
        let height = params.background.height();
        device.viewport(0, 0, width as i32, height as i32);
        device.scissor(
            (transform.clip_translation[0] * width as f64) as i32,
            (transform.clip_translation[1] * height as f64) as i32,
            (transform.clip_scale[0] * width as f64) as i32,
            (transform.clip_scale[1] * height as f64) as i32,
        );

        shader.set_vec2(
            "fill_translation",
            transform.fill_translation[0],
            transform.fill_translation[1],
        );
        shader.set_vec2("fill_scale", transform.fill_scale[0], transform.fill_scale[1]);

        unsafe { gl::DrawArrays(gl::TRIANGLE_STRIP, 0, 4) };

        device.disable_scissor();
        device.field_mask(FieldMask::All, shader);
        crate::ogl::check_gl("kernel draw")
    }
}
