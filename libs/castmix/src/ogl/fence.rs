// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! GPU sync objects.
//!
//! A fence is armed after a transfer is issued and polled with a zero
//! timeout; the GL thread is never blocked on one. Bounded waits live in
//! the host-buffer layer.

use gl::types::GLsync;
use parking_lot::Mutex;

struct SyncPoint(GLsync);

// GLsync is an opaque pointer; the handle itself may cross threads as
// long as all GL calls on it stay on the GL thread.
unsafe impl Send for SyncPoint {}

pub struct Fence {
    sync: Mutex<Option<SyncPoint>>,
}

impl Fence {
    pub fn new() -> Self {
        Self {
            sync: Mutex::new(None),
        }
    }

    /// Arm the fence behind all previously issued GL commands. GL thread
    /// only. Re-arming discards the old sync object.
    pub fn arm(&self) {
        let mut guard = self.sync.lock();
        if let Some(old) = guard.take() {
            unsafe { gl::DeleteSync(old.0) };
        }
        let sync = unsafe { gl::FenceSync(gl::SYNC_GPU_COMMANDS_COMPLETE, 0) };
        if !sync.is_null() {
            *guard = Some(SyncPoint(sync));
        }
    }

    /// Poll without blocking. GL thread only. An unarmed fence is ready;
    /// a signaled sync object is released on first observation.
    pub fn ready(&self) -> bool {
        let mut guard = self.sync.lock();
        let Some(sync) = guard.as_ref() else {
            return true;
        };
        let status = unsafe { gl::ClientWaitSync(sync.0, gl::SYNC_FLUSH_COMMANDS_BIT, 0) };
        if status == gl::ALREADY_SIGNALED || status == gl::CONDITION_SATISFIED {
            if let Some(done) = guard.take() {
                unsafe { gl::DeleteSync(done.0) };
            }
            true
        } else {
            false
        }
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        if let Some(sync) = self.sync.lock().take() {
            unsafe { gl::DeleteSync(sync.0) };
        }
    }
}
