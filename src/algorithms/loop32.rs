//! Two-pass sorted A-buffer over 32-bit atomic-min cells.
//!
//! The depth pre-pass maintains the K nearest depths per slot in ascending
//! order: a candidate bubbles rightward through atomic-min cells, each
//! successful min strictly decreasing a cell, until it settles into a
//! sentinel or equal cell. The color pass recomputes each fragment's depth
//! (which must be bit-identical), binary-searches the frozen sorted plane
//! for it, and stores the color alongside; anything past the K-th depth is
//! tail-blended. The composite then reads colors in already-sorted order.
//!
//! Assumes pixel granularity; multisampling is rejected at configuration.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::MAX_LAYERS;
use crate::fragment::{depth_to_bits, pack_unorm4x8, Fragment, DEPTH_SENTINEL};

use super::{composite_sorted, EmitCtx, LayerEntry, ResolveCtx, Technique};

pub(crate) struct Loop32 {
    layers: usize,
    depths: Vec<AtomicU32>,
    colors: Vec<AtomicU32>,
}

impl Loop32 {
    pub fn new(slot_count: usize, layers: usize) -> Self {
        let cells = slot_count * layers;
        let mut depths = Vec::with_capacity(cells);
        depths.resize_with(cells, || AtomicU32::new(DEPTH_SENTINEL));
        let mut colors = Vec::with_capacity(cells);
        colors.resize_with(cells, || AtomicU32::new(0));
        Self {
            layers,
            depths,
            colors,
        }
    }

    #[cfg(test)]
    fn depth_cells(&self, slot: usize) -> Vec<u32> {
        (0..self.layers)
            .map(|i| self.depths[slot * self.layers + i].load(Ordering::Relaxed))
            .collect()
    }
}

impl Technique for Loop32 {
    fn clear(&mut self) {
        for d in &self.depths {
            d.store(DEPTH_SENTINEL, Ordering::Relaxed);
        }
        for c in &self.colors {
            c.store(0, Ordering::Relaxed);
        }
    }

    fn needs_depth_pass(&self) -> bool {
        true
    }

    fn insert_depth(&self, slot: usize, depth_bits: u32) {
        if self.layers == 0 {
            return;
        }
        let base = slot * self.layers;
        // Coarse early-out: the last cell only ever decreases, so a
        // candidate at or past it can never enter the top K.
        let last = self.depths[base + self.layers - 1].load(Ordering::Relaxed);
        if last != DEPTH_SENTINEL && depth_bits >= last {
            return;
        }
        let mut z = depth_bits;
        for i in 0..self.layers {
            let prev = self.depths[base + i].fetch_min(z, Ordering::Relaxed);
            if prev == DEPTH_SENTINEL || prev == z {
                return;
            }
            z = prev.max(z);
        }
    }

    fn insert(&self, slot: usize, frag: &Fragment, _seq: u32, ctx: &EmitCtx<'_>) {
        if self.layers == 0 {
            ctx.tail(frag.color, frag.coverage);
            return;
        }
        let base = slot * self.layers;
        let z = depth_to_bits(frag.depth);
        if z > self.depths[base + self.layers - 1].load(Ordering::Relaxed) {
            ctx.tail(frag.color, frag.coverage);
            return;
        }
        // The depth plane is frozen between passes; find the exact match.
        let mut lo = 0usize;
        let mut hi = self.layers;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.depths[base + mid].load(Ordering::Relaxed) < z {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo < self.layers && self.depths[base + lo].load(Ordering::Relaxed) == z {
            self.colors[base + lo].store(pack_unorm4x8(frag.color), Ordering::Relaxed);
            ctx.stats.add_stored();
        } else {
            // Depth did not reproduce bit-identically; degrade to the tail.
            ctx.tail(frag.color, frag.coverage);
        }
    }

    fn resolve_slot(&self, slot: usize, ctx: &mut ResolveCtx<'_>) {
        let base = slot * self.layers;
        let mut entries = [LayerEntry::default(); MAX_LAYERS as usize];
        let mut count = 0;
        for i in 0..self.layers {
            let d = self.depths[base + i].load(Ordering::Relaxed);
            if d == DEPTH_SENTINEL {
                break;
            }
            entries[count] = LayerEntry {
                depth_bits: d,
                color: self.colors[base + i].load(Ordering::Relaxed),
                coverage: u32::MAX,
            };
            count += 1;
        }
        composite_sorted(&entries[..count], ctx);
    }
}
