// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Headless OpenGL context bootstrap.
//!
//! The device renders to textures only, so the context is created
//! against a 1x1 pbuffer via EGL and never touches a window system. EGL
//! is loaded dynamically; machines without it fail channel startup with
//! a `Context` error rather than a link failure.

use khronos_egl as egl;

use crate::error::{MixerError, Result};

pub(crate) struct GlContext {
    egl: egl::DynamicInstance<egl::EGL1_5>,
    display: egl::Display,
    surface: egl::Surface,
    context: egl::Context,
}

impl GlContext {
    /// Create the context and make it current on the calling thread
    /// (the GL executor thread), then load the GL function pointers.
    #[allow(unused_unsafe)]
    pub fn new() -> Result<Self> {
        let lib = unsafe { egl::DynamicInstance::<egl::EGL1_5>::load_required() }
            .map_err(|e| MixerError::Context(format!("failed to load libEGL: {e}")))?;

        let display = unsafe { lib.get_display(egl::DEFAULT_DISPLAY) }
            .ok_or_else(|| MixerError::Context("no EGL display".into()))?;
        lib.initialize(display)
            .map_err(|e| MixerError::Context(format!("eglInitialize failed: {e}")))?;
        lib.bind_api(egl::OPENGL_API)
            .map_err(|e| MixerError::Context(format!("desktop GL not supported: {e}")))?;

        let config_attribs = [
            egl::SURFACE_TYPE,
            egl::PBUFFER_BIT,
            egl::RENDERABLE_TYPE,
            egl::OPENGL_BIT,
            egl::RED_SIZE,
            8,
            egl::GREEN_SIZE,
            8,
            egl::BLUE_SIZE,
            8,
            egl::ALPHA_SIZE,
            8,
            egl::NONE,
        ];
        let config = lib
            .choose_first_config(display, &config_attribs)
            .map_err(|e| MixerError::Context(format!("eglChooseConfig failed: {e}")))?
            .ok_or_else(|| MixerError::Context("no matching EGL config".into()))?;

        let surface_attribs = [egl::WIDTH, 1, egl::HEIGHT, 1, egl::NONE];
        let surface = lib
            .create_pbuffer_surface(display, config, &surface_attribs)
            .map_err(|e| MixerError::Context(format!("pbuffer creation failed: {e}")))?;

        let context_attribs = [
            egl::CONTEXT_MAJOR_VERSION,
            3,
            egl::CONTEXT_MINOR_VERSION,
            3,
            egl::CONTEXT_OPENGL_PROFILE_MASK,
            egl::CONTEXT_OPENGL_CORE_PROFILE_BIT,
            egl::NONE,
        ];
        let context = lib
            .create_context(display, config, None, &context_attribs)
            .map_err(|e| MixerError::Context(format!("GL 3.3 core context unavailable: {e}")))?;

        lib.make_current(display, Some(surface), Some(surface), Some(context))
            .map_err(|e| MixerError::Context(format!("eglMakeCurrent failed: {e}")))?;

        gl::load_with(|name| match lib.get_proc_address(name) {
            Some(proc_addr) => proc_addr as *const std::ffi::c_void,
            None => std::ptr::null(),
        });

        Ok(Self {
            egl: lib,
            display,
            surface,
            context,
        })
    }

    /// "VERSION VENDOR" of the live context, for startup logging.
    pub fn description(&self) -> String {
        let read = |name| unsafe {
            let ptr = gl::GetString(name);
            if ptr.is_null() {
                "unknown".to_string()
            } else {
                std::ffi::CStr::from_ptr(ptr.cast()).to_string_lossy().into_owned()
            }
        };
        format!("{} {}", read(gl::VERSION), read(gl::VENDOR))
    }
}

impl Drop for GlContext {
    fn drop(&mut self) {
        let _ = self.egl.make_current(self.display, None, None, None);
        let _ = self.egl.destroy_context(self.display, self.context);
        let _ = self.egl.destroy_surface(self.display, self.surface);
        let _ = self.egl.terminate(self.display);
    }
}

/// Fold any pending GL error into a `Result`. Transient errors in the
/// command stream are fatal for the channel, per the device contract.
pub(crate) fn check_gl(operation: &str) -> Result<()> {
    let error = unsafe { gl::GetError() };
    if error == gl::NO_ERROR {
        Ok(())
    } else {
        Err(MixerError::Gl(format!("{operation}: 0x{error:04x}")))
    }
}
