//! Error types for castmix
//!
//! Defines the core error types used throughout the mixer. Precondition
//! violations (bad strides, zero sizes) are programming bugs and are
//! reported as `InvalidArgument` after a `debug_assert!`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MixerError {
    /// Device or host buffer could not be allocated even after a GC retry.
    /// Fatal for the current render; the orchestrator emits a black frame.
    #[error("GPU resources exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    #[error("OpenGL operation failed: {0}")]
    Gl(String),

    #[error("Context initialization failed: {0}")]
    Context(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The GL executor has shut down; no further tasks can run.
    #[error("GPU device is gone")]
    DeviceGone,

    /// The channel's frame mixer has stopped accepting work.
    #[error("channel is stopped")]
    ChannelStopped,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type that uses MixerError
pub type Result<T> = std::result::Result<T, MixerError>;
