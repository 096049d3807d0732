//! Spinlock variant: the top-K slab behind a per-slot binary lock word.
//!
//! Acquisition is an atomic exchange 0 -> 1 retried until it observes 0,
//! release is a plain store of 0. The critical section is O(K), which
//! bounds the spin of every contender on the slot.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::fragment::Fragment;

use super::lock::TopKSlab;
use super::{EmitCtx, ResolveCtx, Technique};

pub(crate) struct Spinlock {
    locks: Vec<AtomicU32>,
    slab: TopKSlab,
}

impl Spinlock {
    pub fn new(slot_count: usize, layers: usize, coverage_shading: bool) -> Self {
        let mut locks = Vec::with_capacity(slot_count);
        locks.resize_with(slot_count, || AtomicU32::new(0));
        Self {
            locks,
            slab: TopKSlab::new(slot_count, layers, false, coverage_shading),
        }
    }
}

impl Technique for Spinlock {
    fn clear(&mut self) {
        self.slab.clear();
    }

    fn insert(&self, slot: usize, frag: &Fragment, seq: u32, ctx: &EmitCtx<'_>) {
        let lock = &self.locks[slot];
        while lock.swap(1, Ordering::Acquire) == 1 {
            std::hint::spin_loop();
        }
        self.slab.insert_locked(slot, frag, seq, ctx);
        lock.store(0, Ordering::Release);
    }

    fn resolve_slot(&self, slot: usize, ctx: &mut ResolveCtx<'_>) {
        self.slab.resolve_slot(slot, ctx);
    }
}
