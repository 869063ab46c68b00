// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! OpenGL resource layer: the single-threaded device executor, pooled
//! textures and transfer buffers, shaders and fences.

mod context;
mod device;
mod device_buffer;
mod executor;
mod fence;
mod host_buffer;
mod pool;
mod shader;

pub(crate) use context::check_gl;
pub use device::{FieldMask, GlDevice};
pub use device_buffer::{DeviceBuffer, Texture};
pub use executor::{GlExecutor, TaskFuture, TaskPriority};
pub use fence::Fence;
pub use host_buffer::{BufferUsage, HostBuffer, PixelBuffer};
pub use pool::KeyedPool;
pub use shader::Shader;
