//! Unsorted bounded A-buffer: first K observed fragments per slot.
//!
//! Insertion is one atomic increment plus plain stores; everything past K
//! goes straight to the tail blender. The retention policy is
//! first-K-observed, not nearest-K: late arrivals are only captured by the
//! sorting variants.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::MAX_LAYERS;
use crate::fragment::{depth_to_bits, pack_unorm4x8, Fragment};

use super::{composite_sorted, sort_by_depth, EmitCtx, LayerEntry, ResolveCtx, Technique};

pub(crate) struct Simple {
    layers: usize,
    counters: Vec<AtomicU32>,
    depths: Vec<AtomicU32>,
    colors: Vec<AtomicU32>,
    /// Present only under coverage shading; the A-buffer record widens by
    /// one word exactly as the GPU buffer stride does.
    coverage: Vec<AtomicU32>,
}

impl Simple {
    pub fn new(slot_count: usize, layers: usize, coverage_shading: bool) -> Self {
        let cells = slot_count * layers;
        let mut counters = Vec::with_capacity(slot_count);
        counters.resize_with(slot_count, || AtomicU32::new(0));
        let mut depths = Vec::with_capacity(cells);
        depths.resize_with(cells, || AtomicU32::new(0));
        let mut colors = Vec::with_capacity(cells);
        colors.resize_with(cells, || AtomicU32::new(0));
        let mut coverage = Vec::new();
        if coverage_shading {
            coverage.resize_with(cells, || AtomicU32::new(0));
        }
        Self {
            layers,
            counters,
            depths,
            colors,
            coverage,
        }
    }

    fn entry(&self, idx: usize) -> LayerEntry {
        LayerEntry {
            depth_bits: self.depths[idx].load(Ordering::Relaxed),
            color: self.colors[idx].load(Ordering::Relaxed),
            coverage: if self.coverage.is_empty() {
                u32::MAX
            } else {
                self.coverage[idx].load(Ordering::Relaxed)
            },
        }
    }
}

impl Technique for Simple {
    fn clear(&mut self) {
        for c in &self.counters {
            c.store(0, Ordering::Relaxed);
        }
    }

    fn insert(&self, slot: usize, frag: &Fragment, _seq: u32, ctx: &EmitCtx<'_>) {
        if self.layers == 0 {
            ctx.tail(frag.color, frag.coverage);
            return;
        }
        let n = self.counters[slot].fetch_add(1, Ordering::Relaxed) as usize;
        if n < self.layers {
            let idx = slot * self.layers + n;
            self.depths[idx].store(depth_to_bits(frag.depth), Ordering::Relaxed);
            self.colors[idx].store(pack_unorm4x8(frag.color), Ordering::Relaxed);
            if !self.coverage.is_empty() {
                self.coverage[idx].store(frag.coverage, Ordering::Relaxed);
            }
            ctx.stats.add_stored();
        } else {
            ctx.tail(frag.color, frag.coverage);
        }
    }

    fn resolve_slot(&self, slot: usize, ctx: &mut ResolveCtx<'_>) {
        let count = (self.counters[slot].load(Ordering::Relaxed) as usize).min(self.layers);
        let mut entries = [LayerEntry::default(); MAX_LAYERS as usize];
        for i in 0..count {
            entries[i] = self.entry(slot * self.layers + i);
        }
        sort_by_depth(&mut entries[..count]);
        composite_sorted(&entries[..count], ctx);
    }
}
