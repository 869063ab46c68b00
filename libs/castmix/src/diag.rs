// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-channel diagnostics.
//!
//! Updated once per tick by the frame mixer and readable from any
//! thread. Values are diagnostics, never errors: a stalling GPU shows
//! up here (and as backpressure), not as a failed tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct DiagInner {
    ticks: AtomicU64,
    /// Last tick's full render time in microseconds.
    frame_time_us: AtomicU64,
    /// Last tick's time spent waiting on the readback fence, ms.
    frame_wait_ms: AtomicU64,
    /// Finished frames sitting in the output queue.
    output_queue_depth: AtomicU64,
    /// Audio items dropped for sample-count mismatch, cumulative.
    dropped_audio_items: AtomicU64,
    /// Ticks that failed to render and emitted a black frame.
    black_frames: AtomicU64,
}

/// Shared handle to a channel's per-tick measurements.
#[derive(Clone, Default)]
pub struct ChannelDiag {
    inner: Arc<DiagInner>,
}

impl ChannelDiag {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_tick(&self, frame_time_us: u64, frame_wait_ms: u64, queue_depth: u64) {
        self.inner.ticks.fetch_add(1, Ordering::Relaxed);
        self.inner
            .frame_time_us
            .store(frame_time_us, Ordering::Relaxed);
        self.inner
            .frame_wait_ms
            .store(frame_wait_ms, Ordering::Relaxed);
        self.inner
            .output_queue_depth
            .store(queue_depth, Ordering::Relaxed);
        tracing::trace!(frame_time_us, frame_wait_ms, queue_depth, "tick");
    }

    pub(crate) fn record_dropped_audio(&self, total: u64) {
        self.inner
            .dropped_audio_items
            .store(total, Ordering::Relaxed);
    }

    pub(crate) fn record_black_frame(&self) {
        self.inner.black_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::Relaxed)
    }

    pub fn frame_time_us(&self) -> u64 {
        self.inner.frame_time_us.load(Ordering::Relaxed)
    }

    pub fn frame_wait_ms(&self) -> u64 {
        self.inner.frame_wait_ms.load(Ordering::Relaxed)
    }

    pub fn output_queue_depth(&self) -> u64 {
        self.inner.output_queue_depth.load(Ordering::Relaxed)
    }

    pub fn dropped_audio_items(&self) -> u64 {
        self.inner.dropped_audio_items.load(Ordering::Relaxed)
    }

    pub fn black_frames(&self) -> u64 {
        self.inner.black_frames.load(Ordering::Relaxed)
    }
}
