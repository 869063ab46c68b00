// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Compiled GLSL programs with cached uniform locations.

use gl::types::{GLint, GLuint};
use parking_lot::Mutex;

use ahash::AHashMap;

use crate::error::{MixerError, Result};

pub struct Shader {
    program: GLuint,
    uniforms: Mutex<AHashMap<String, GLint>>,
}

unsafe impl Send for Shader {}
unsafe impl Sync for Shader {}

fn compile(kind: u32, source: &str) -> Result<GLuint> {
    unsafe {
        let shader = gl::CreateShader(kind);
        let ptr = source.as_ptr().cast();
        let len = source.len() as GLint;
        gl::ShaderSource(shader, 1, &ptr, &len);
        gl::CompileShader(shader);

        let mut status = 0;
        gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);
        if status == 0 {
            let mut log_len = 0;
            gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut log_len);
            let mut log = vec![0u8; log_len.max(1) as usize];
            gl::GetShaderInfoLog(shader, log_len, std::ptr::null_mut(), log.as_mut_ptr().cast());
            gl::DeleteShader(shader);
            let text = String::from_utf8_lossy(&log).trim_end_matches('\0').to_string();
            return Err(MixerError::ShaderCompilation(text));
        }
        Ok(shader)
    }
}

impl Shader {
    /// Compile and link. GL thread only. Failure here is fatal for the
    /// channel — there is no fallback shader.
    pub fn new(vertex_source: &str, fragment_source: &str) -> Result<Self> {
        let vertex = compile(gl::VERTEX_SHADER, vertex_source)?;
        let fragment = compile(gl::FRAGMENT_SHADER, fragment_source)?;

        unsafe {
            let program = gl::CreateProgram();
            gl::AttachShader(program, vertex);
            gl::AttachShader(program, fragment);
            gl::LinkProgram(program);
            gl::DeleteShader(vertex);
            gl::DeleteShader(fragment);

            let mut status = 0;
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
            if status == 0 {
                let mut log_len = 0;
                gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut log_len);
                let mut log = vec![0u8; log_len.max(1) as usize];
                gl::GetProgramInfoLog(
                    program,
                    log_len,
                    std::ptr::null_mut(),
                    log.as_mut_ptr().cast(),
                );
                gl::DeleteProgram(program);
                let text = String::from_utf8_lossy(&log).trim_end_matches('\0').to_string();
                return Err(MixerError::ShaderCompilation(text));
            }

            Ok(Self {
                program,
                uniforms: Mutex::new(AHashMap::new()),
            })
        }
    }

    pub(crate) fn id(&self) -> GLuint {
        self.program
    }

    fn location(&self, name: &str) -> GLint {
        let mut cache = self.uniforms.lock();
        if let Some(&loc) = cache.get(name) {
            return loc;
        }
        let c_name = std::ffi::CString::new(name).expect("uniform name");
        let loc = unsafe { gl::GetUniformLocation(self.program, c_name.as_ptr()) };
        cache.insert(name.to_string(), loc);
        loc
    }

    /// Uniform setters. The program must be active; GL thread only.
    pub fn set_i32(&self, name: &str, value: i32) {
        unsafe { gl::Uniform1i(self.location(name), value) };
    }

    pub fn set_bool(&self, name: &str, value: bool) {
        self.set_i32(name, value as i32);
    }

    pub fn set_f32(&self, name: &str, value: f64) {
        unsafe { gl::Uniform1f(self.location(name), value as f32) };
    }

    pub fn set_vec2(&self, name: &str, x: f64, y: f64) {
        unsafe { gl::Uniform2f(self.location(name), x as f32, y as f32) };
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        // Reached on the GL thread at device teardown.
        unsafe { gl::DeleteProgram(self.program) };
    }
}
