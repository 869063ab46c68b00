// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Keyed recycling pools.
//!
//! Buffers never change shape, so a queue per shape key is enough: pop
//! on acquire, push back on the handle's last drop. Queues are lock-free
//! and shared by every channel on the device; the outer map only locks
//! to create a queue the first time a shape is seen.

use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashMap;
use crossbeam_queue::SegQueue;
use parking_lot::Mutex;

pub struct KeyedPool<K, T> {
    queues: Mutex<AHashMap<K, Arc<SegQueue<T>>>>,
}

impl<K: Eq + Hash + Clone, T> KeyedPool<K, T> {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(AHashMap::new()),
        }
    }

    /// The queue for `key`, created empty on first use. The returned
    /// handle stays valid across [`KeyedPool::clear`] — clearing empties
    /// queues, it does not replace them, so an outstanding buffer still
    /// returns to the queue its shape names.
    pub fn queue(&self, key: K) -> Arc<SegQueue<T>> {
        self.queues.lock().entry(key).or_default().clone()
    }

    /// Empty every queue, handing each pooled item to `dispose`.
    pub fn clear(&self, mut dispose: impl FnMut(T)) {
        let queues: Vec<_> = self.queues.lock().values().cloned().collect();
        for queue in queues {
            while let Some(item) = queue.pop() {
                dispose(item);
            }
        }
    }

    /// Total number of idle items across all queues.
    pub fn idle_count(&self) -> usize {
        self.queues.lock().values().map(|q| q.len()).sum()
    }
}

impl<K: Eq + Hash + Clone, T> Default for KeyedPool<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_same_queue() {
        let pool: KeyedPool<(usize, u64), u32> = KeyedPool::new();
        let a = pool.queue((4, 100));
        let b = pool.queue((4, 100));
        a.push(7);
        assert_eq!(b.pop(), Some(7));
    }

    #[test]
    fn test_distinct_keys_isolated() {
        let pool: KeyedPool<(usize, u64), u32> = KeyedPool::new();
        pool.queue((1, 1)).push(10);
        assert_eq!(pool.queue((2, 1)).pop(), None);
        assert_eq!(pool.queue((1, 2)).pop(), None);
        assert_eq!(pool.queue((1, 1)).pop(), Some(10));
    }

    #[test]
    fn test_clear_disposes_and_keeps_queues_alive() {
        let pool: KeyedPool<u8, u32> = KeyedPool::new();
        let q = pool.queue(1);
        q.push(1);
        q.push(2);

        let mut disposed = Vec::new();
        pool.clear(|item| disposed.push(item));
        disposed.sort_unstable();
        assert_eq!(disposed, vec![1, 2]);
        assert_eq!(pool.idle_count(), 0);

        // A handle acquired before the clear still feeds the same queue.
        q.push(3);
        assert_eq!(pool.queue(1).pop(), Some(3));
    }
}
