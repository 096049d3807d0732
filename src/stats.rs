//! Per-frame fragment accounting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of one frame's fragment traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Fragments absorbed into per-slot storage.
    pub stored: u64,
    /// Overflow fragments composited immediately.
    pub tail_blended: u64,
    /// Overflow fragments dropped because tail blending is off.
    pub discarded: u64,
    /// Fragments that found the shared pool exhausted.
    pub pool_exhausted: u64,
}

/// Lock-free counters behind [`FrameStats`].
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    stored: AtomicU64,
    tail_blended: AtomicU64,
    discarded: AtomicU64,
    pool_exhausted: AtomicU64,
}

impl StatCounters {
    pub fn reset(&self) {
        self.stored.store(0, Ordering::Relaxed);
        self.tail_blended.store(0, Ordering::Relaxed);
        self.discarded.store(0, Ordering::Relaxed);
        self.pool_exhausted.store(0, Ordering::Relaxed);
    }

    pub fn add_stored(&self) {
        self.stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_tail_blended(&self) {
        self.tail_blended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pool_exhausted(&self) {
        self.pool_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FrameStats {
        FrameStats {
            stored: self.stored.load(Ordering::Relaxed),
            tail_blended: self.tail_blended.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            pool_exhausted: self.pool_exhausted.load(Ordering::Relaxed),
        }
    }
}
