//! Single-pass sorted A-buffer over packed 64-bit atomic-min cells.
//!
//! Same bubbling insertion as the 32-bit loop, but depth (high word) and
//! packed color (low word) travel together, so one atomic-min pass sorts
//! and assigns colors at once. After K steps a candidate that never settled
//! is the displaced farthest record of the slot and goes to the tail
//! blender, colors intact. Requires 64-bit atomic min; configuration falls
//! back to the two-pass loop where that is missing.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::MAX_LAYERS;
use crate::fragment::{
    depth_to_bits, pack_depth_color, pack_unorm4x8, word_color, word_depth, Fragment, WORD_SENTINEL,
};

use super::{composite_sorted, EmitCtx, LayerEntry, ResolveCtx, Technique};

pub(crate) struct Loop64 {
    layers: usize,
    words: Vec<AtomicU64>,
}

impl Loop64 {
    pub fn new(slot_count: usize, layers: usize) -> Self {
        let cells = slot_count * layers;
        let mut words = Vec::with_capacity(cells);
        words.resize_with(cells, || AtomicU64::new(WORD_SENTINEL));
        Self { layers, words }
    }

    #[cfg(test)]
    fn words_of(&self, slot: usize) -> Vec<u64> {
        (0..self.layers)
            .map(|i| self.words[slot * self.layers + i].load(Ordering::Relaxed))
            .collect()
    }
}

impl Technique for Loop64 {
    fn clear(&mut self) {
        for w in &self.words {
            w.store(WORD_SENTINEL, Ordering::Relaxed);
        }
    }

    fn insert(&self, slot: usize, frag: &Fragment, _seq: u32, ctx: &EmitCtx<'_>) {
        if self.layers == 0 {
            ctx.tail(frag.color, frag.coverage);
            return;
        }
        let base = slot * self.layers;
        let z = depth_to_bits(frag.depth);
        let last = self.words[base + self.layers - 1].load(Ordering::Relaxed);
        if last != WORD_SENTINEL && z > word_depth(last) {
            ctx.tail(frag.color, frag.coverage);
            return;
        }
        let incoming = pack_depth_color(z, pack_unorm4x8(frag.color));
        let mut w = incoming;
        for i in 0..self.layers {
            let prev = self.words[base + i].fetch_min(w, Ordering::Relaxed);
            if prev == WORD_SENTINEL || prev == w {
                ctx.stats.add_stored();
                return;
            }
            w = prev.max(w);
        }
        if w == incoming {
            // Never found a home; races shrank the slot under us.
            ctx.tail(frag.color, frag.coverage);
        } else {
            // We settled and pushed the previous farthest record out.
            ctx.stats.add_stored();
            ctx.tail_packed(word_color(w), frag.coverage);
        }
    }

    fn resolve_slot(&self, slot: usize, ctx: &mut ResolveCtx<'_>) {
        let base = slot * self.layers;
        let mut entries = [LayerEntry::default(); MAX_LAYERS as usize];
        let mut count = 0;
        for i in 0..self.layers {
            let w = self.words[base + i].load(Ordering::Relaxed);
            if w == WORD_SENTINEL {
                break;
            }
            entries[count] = LayerEntry {
                depth_bits: word_depth(w),
                color: word_color(w),
                coverage: u32::MAX,
            };
            count += 1;
        }
        composite_sorted(&entries[..count], ctx);
    }
}
