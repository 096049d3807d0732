//! Shared-pool linked list A-buffer.
//!
//! All slots allocate nodes from one arena through a single monotonic
//! counter, so exhaustion is frame-wide: one overloaded slot can starve
//! every other slot for the rest of the frame. Insertion exchanges the
//! slot's head with the fresh node index; the node is exclusively owned by
//! its allocating thread, which makes the publish correct under any
//! interleaving. Index 0 is the chain terminator.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::blend;
use crate::fragment::{depth_to_bits, pack_unorm4x8, unpack_unorm4x8, Fragment};

use super::{EmitCtx, LayerEntry, ResolveCtx, SortedFront, Technique};

pub(crate) struct LinkedList {
    /// Sorted-front window used at resolve; pool storage is unbounded by it.
    front_layers: usize,
    pool_cap: u32,
    next_alloc: AtomicU32,
    heads: Vec<AtomicU32>,
    node_depth: Vec<AtomicU32>,
    node_color: Vec<AtomicU32>,
    node_next: Vec<AtomicU32>,
    node_coverage: Vec<AtomicU32>,
}

impl LinkedList {
    pub fn new(slot_count: usize, pool_cap: u32, front_layers: usize, coverage_shading: bool) -> Self {
        let nodes = pool_cap as usize + 1; // index 0 unused
        let mut heads = Vec::with_capacity(slot_count);
        heads.resize_with(slot_count, || AtomicU32::new(0));
        let mut node_depth = Vec::with_capacity(nodes);
        node_depth.resize_with(nodes, || AtomicU32::new(0));
        let mut node_color = Vec::with_capacity(nodes);
        node_color.resize_with(nodes, || AtomicU32::new(0));
        let mut node_next = Vec::with_capacity(nodes);
        node_next.resize_with(nodes, || AtomicU32::new(0));
        let mut node_coverage = Vec::new();
        if coverage_shading {
            node_coverage.resize_with(nodes, || AtomicU32::new(0));
        }
        Self {
            front_layers,
            pool_cap,
            next_alloc: AtomicU32::new(0),
            heads,
            node_depth,
            node_color,
            node_next,
            node_coverage,
        }
    }

    fn node_entry(&self, node: usize) -> LayerEntry {
        LayerEntry {
            depth_bits: self.node_depth[node].load(Ordering::Relaxed),
            color: self.node_color[node].load(Ordering::Relaxed),
            coverage: if self.node_coverage.is_empty() {
                u32::MAX
            } else {
                self.node_coverage[node].load(Ordering::Relaxed)
            },
        }
    }

    /// Successful allocations so far this frame.
    #[cfg(test)]
    pub fn allocations(&self) -> u32 {
        self.next_alloc.load(Ordering::Relaxed).min(self.pool_cap)
    }

    /// Chain length of one slot.
    #[cfg(test)]
    pub fn chain_len(&self, slot: usize) -> usize {
        let mut n = 0;
        let mut node = self.heads[slot].load(Ordering::Relaxed) as usize;
        while node != 0 {
            n += 1;
            node = self.node_next[node].load(Ordering::Relaxed) as usize;
        }
        n
    }
}

impl Technique for LinkedList {
    fn clear(&mut self) {
        self.next_alloc.store(0, Ordering::Relaxed);
        for h in &self.heads {
            h.store(0, Ordering::Relaxed);
        }
    }

    fn insert(&self, slot: usize, frag: &Fragment, _seq: u32, ctx: &EmitCtx<'_>) {
        let n = self.next_alloc.fetch_add(1, Ordering::Relaxed);
        if n >= self.pool_cap {
            ctx.stats.add_pool_exhausted();
            ctx.tail(frag.color, frag.coverage);
            return;
        }
        let node = (n + 1) as usize;
        self.node_depth[node].store(depth_to_bits(frag.depth), Ordering::Relaxed);
        self.node_color[node].store(pack_unorm4x8(frag.color), Ordering::Relaxed);
        if !self.node_coverage.is_empty() {
            self.node_coverage[node].store(frag.coverage, Ordering::Relaxed);
        }
        let prev_head = self.heads[slot].swap(node as u32, Ordering::AcqRel);
        self.node_next[node].store(prev_head, Ordering::Relaxed);
        ctx.stats.add_stored();
    }

    fn resolve_slot(&self, slot: usize, ctx: &mut ResolveCtx<'_>) {
        for lane in ctx.lanes() {
            let mut acc = ctx.base(lane);
            let mut front = SortedFront::new(self.front_layers);
            // Head to terminator is reverse insertion order; each visited
            // entry either joins the sorted front or displaces its farthest
            // member into the running tail blend.
            let mut node = self.heads[slot].load(Ordering::Relaxed) as usize;
            while node != 0 {
                let entry = self.node_entry(node);
                if ctx.entry_covers(&entry, lane) {
                    if let Some(evicted) = front.insert(entry) {
                        if ctx.tail_blend {
                            acc = blend::over(acc, unpack_unorm4x8(evicted.color));
                        }
                    }
                }
                node = self.node_next[node].load(Ordering::Relaxed) as usize;
            }
            for entry in front.entries().iter().rev() {
                acc = blend::over(acc, unpack_unorm4x8(entry.color));
            }
            ctx.write(lane, acc);
        }
    }
}
