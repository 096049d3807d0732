//! The critical-section top-K slab shared by the spinlock and interlock
//! variants.
//!
//! All slab operations assume the caller holds the slot's critical section;
//! the wrappers differ only in how they provide it. Inside the section:
//! append while under capacity, otherwise early-reject against the cached
//! furthest depth, then an O(K) scan finds the farthest resident, which is
//! evicted to the tail blender if the incoming fragment is nearer. The
//! cache is recomputed before the section ends, so it always equals the
//! maximum resident depth.
//!
//! Without ordering, which of several equal-depth fragments stays resident
//! depends on arrival order (accepted nondeterminism). Ordered mode breaks
//! depth ties with the submission sequence, which reproduces the result of
//! processing the slot's fragments in submission order.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::MAX_LAYERS;
use crate::fragment::{depth_to_bits, pack_unorm4x8, Fragment};

use super::{composite_sorted, EmitCtx, LayerEntry, ResolveCtx};

pub(crate) struct TopKSlab {
    layers: usize,
    ordered: bool,
    counts: Vec<AtomicU32>,
    /// Cached max depth over residents; meaningful while count > 0.
    furthest: Vec<AtomicU32>,
    depths: Vec<AtomicU32>,
    seqs: Vec<AtomicU32>,
    colors: Vec<AtomicU32>,
    coverage: Vec<AtomicU32>,
}

impl TopKSlab {
    pub fn new(slot_count: usize, layers: usize, ordered: bool, coverage_shading: bool) -> Self {
        let cells = slot_count * layers;
        let mut counts = Vec::with_capacity(slot_count);
        counts.resize_with(slot_count, || AtomicU32::new(0));
        let mut furthest = Vec::with_capacity(slot_count);
        furthest.resize_with(slot_count, || AtomicU32::new(0));
        let mut depths = Vec::with_capacity(cells);
        depths.resize_with(cells, || AtomicU32::new(0));
        let mut seqs = Vec::with_capacity(cells);
        seqs.resize_with(cells, || AtomicU32::new(0));
        let mut colors = Vec::with_capacity(cells);
        colors.resize_with(cells, || AtomicU32::new(0));
        let mut coverage = Vec::new();
        if coverage_shading {
            coverage.resize_with(cells, || AtomicU32::new(0));
        }
        Self {
            layers,
            ordered,
            counts,
            furthest,
            depths,
            seqs,
            colors,
            coverage,
        }
    }

    pub fn clear(&mut self) {
        for c in &self.counts {
            c.store(0, Ordering::Relaxed);
        }
        for f in &self.furthest {
            f.store(0, Ordering::Relaxed);
        }
    }

    fn write_cell(&self, idx: usize, depth_bits: u32, seq: u32, frag: &Fragment) {
        self.depths[idx].store(depth_bits, Ordering::Relaxed);
        self.seqs[idx].store(seq, Ordering::Relaxed);
        self.colors[idx].store(pack_unorm4x8(frag.color), Ordering::Relaxed);
        if !self.coverage.is_empty() {
            self.coverage[idx].store(frag.coverage, Ordering::Relaxed);
        }
    }

    /// Insert one fragment. The slot's critical section must be held.
    pub fn insert_locked(&self, slot: usize, frag: &Fragment, seq: u32, ctx: &EmitCtx<'_>) {
        if self.layers == 0 {
            ctx.tail(frag.color, frag.coverage);
            return;
        }
        let base = slot * self.layers;
        let z = depth_to_bits(frag.depth);
        let n = self.counts[slot].load(Ordering::Relaxed) as usize;

        if n < self.layers {
            self.write_cell(base + n, z, seq, frag);
            self.counts[slot].store(n as u32 + 1, Ordering::Relaxed);
            let max = if n == 0 {
                z
            } else {
                self.furthest[slot].load(Ordering::Relaxed).max(z)
            };
            self.furthest[slot].store(max, Ordering::Relaxed);
            ctx.stats.add_stored();
            return;
        }

        let cached = self.furthest[slot].load(Ordering::Relaxed);
        if z > cached || (z == cached && !self.ordered) {
            ctx.tail(frag.color, frag.coverage);
            return;
        }

        // Scan for the farthest resident.
        let mut far_i = 0;
        let mut far_z = self.depths[base].load(Ordering::Relaxed);
        let mut far_seq = self.seqs[base].load(Ordering::Relaxed);
        for i in 1..self.layers {
            let d = self.depths[base + i].load(Ordering::Relaxed);
            let s = self.seqs[base + i].load(Ordering::Relaxed);
            if d > far_z || (self.ordered && d == far_z && s > far_seq) {
                far_i = i;
                far_z = d;
                far_seq = s;
            }
        }

        let wins = z < far_z || (self.ordered && z == far_z && seq < far_seq);
        if !wins {
            ctx.tail(frag.color, frag.coverage);
            return;
        }

        // Evict, replace, and refresh the cache in the same section.
        let cov = if self.coverage.is_empty() {
            u32::MAX
        } else {
            self.coverage[base + far_i].load(Ordering::Relaxed)
        };
        ctx.tail_packed(self.colors[base + far_i].load(Ordering::Relaxed), cov);
        self.write_cell(base + far_i, z, seq, frag);
        let mut max = 0;
        for i in 0..self.layers {
            max = max.max(self.depths[base + i].load(Ordering::Relaxed));
        }
        self.furthest[slot].store(max, Ordering::Relaxed);
        ctx.stats.add_stored();
    }

    pub fn resolve_slot(&self, slot: usize, ctx: &mut ResolveCtx<'_>) {
        let base = slot * self.layers;
        let count = (self.counts[slot].load(Ordering::Relaxed) as usize).min(self.layers);
        let mut entries = [LayerEntry::default(); MAX_LAYERS as usize];
        let mut seqs = [0u32; MAX_LAYERS as usize];
        for i in 0..count {
            entries[i] = LayerEntry {
                depth_bits: self.depths[base + i].load(Ordering::Relaxed),
                color: self.colors[base + i].load(Ordering::Relaxed),
                coverage: if self.coverage.is_empty() {
                    u32::MAX
                } else {
                    self.coverage[base + i].load(Ordering::Relaxed)
                },
            };
            seqs[i] = self.seqs[base + i].load(Ordering::Relaxed);
        }
        // Nearest first; in ordered mode equal depths sort by descending
        // sequence so the back-to-front walk applies earlier submissions
        // first.
        for i in 1..count {
            let e = entries[i];
            let s = seqs[i];
            let mut j = i;
            while j > 0
                && (entries[j - 1].depth_bits > e.depth_bits
                    || (self.ordered
                        && entries[j - 1].depth_bits == e.depth_bits
                        && seqs[j - 1] < s))
            {
                entries[j] = entries[j - 1];
                seqs[j] = seqs[j - 1];
                j -= 1;
            }
            entries[j] = e;
            seqs[j] = s;
        }
        composite_sorted(&entries[..count], ctx);
    }

    #[cfg(test)]
    pub fn resident_depths(&self, slot: usize) -> Vec<u32> {
        let base = slot * self.layers;
        let count = (self.counts[slot].load(Ordering::Relaxed) as usize).min(self.layers);
        (0..count)
            .map(|i| self.depths[base + i].load(Ordering::Relaxed))
            .collect()
    }

    #[cfg(test)]
    pub fn cached_furthest(&self, slot: usize) -> u32 {
        self.furthest[slot].load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn resident_seqs(&self, slot: usize) -> Vec<u32> {
        let base = slot * self.layers;
        let count = (self.counts[slot].load(Ordering::Relaxed) as usize).min(self.layers);
        (0..count)
            .map(|i| self.seqs[base + i].load(Ordering::Relaxed))
            .collect()
    }
}
