//! Interlock variant: the top-K slab behind a platform mutual-exclusion
//! primitive instead of a software spin.
//!
//! On the GPU this is the fragment shader interlock extension; here the
//! slot-scoped primitive is an OS mutex. The ordered submode models the
//! extension's primitive-ordered entry: per the contract its only
//! observable effect on the resident set is deterministic depth tie-breaks,
//! which the slab realizes by comparing (depth, submission sequence).

use std::sync::Mutex;

use crate::fragment::Fragment;

use super::lock::TopKSlab;
use super::{EmitCtx, ResolveCtx, Technique};

pub(crate) struct Interlock {
    locks: Vec<Mutex<()>>,
    slab: TopKSlab,
}

impl Interlock {
    pub fn new(slot_count: usize, layers: usize, ordered: bool, coverage_shading: bool) -> Self {
        let mut locks = Vec::with_capacity(slot_count);
        locks.resize_with(slot_count, || Mutex::new(()));
        Self {
            locks,
            slab: TopKSlab::new(slot_count, layers, ordered, coverage_shading),
        }
    }
}

impl Technique for Interlock {
    fn clear(&mut self) {
        self.slab.clear();
    }

    fn insert(&self, slot: usize, frag: &Fragment, seq: u32, ctx: &EmitCtx<'_>) {
        let _section = self.locks[slot].lock().expect("slot interlock poisoned");
        self.slab.insert_locked(slot, frag, seq, ctx);
    }

    fn resolve_slot(&self, slot: usize, ctx: &mut ResolveCtx<'_>) {
        self.slab.resolve_slot(slot, ctx);
    }
}
