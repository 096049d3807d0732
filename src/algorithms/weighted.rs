//! Weighted blended OIT: approximate, lock-free, O(1) memory per texel.
//!
//! No A-buffer, no ordering. Each fragment adds weight x premultiplied
//! color into an accumulation texel and multiplies (1 - alpha) into a
//! reveal texel; both updates are commutative and associative, so any
//! arrival order produces the same sums up to floating-point tolerance.
//! Resolve normalizes the two channels and blends over the background.
//! Heavy overlap biases the result; it never overflows.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec4;

use crate::blend;
use crate::config::WboitWeights;
use crate::fragment::Fragment;

use super::{EmitCtx, ResolveCtx, Technique};

/// Guard for the weight-sum divisor at resolve.
const REVEAL_EPS: f32 = 1e-4;

fn atomic_add_f32(cell: &AtomicU32, v: f32) {
    let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
        Some((f32::from_bits(bits) + v).to_bits())
    });
}

fn atomic_mul_f32(cell: &AtomicU32, v: f32) {
    let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
        Some((f32::from_bits(bits) * v).to_bits())
    });
}

struct AccumTexel {
    chan: [AtomicU32; 4],
}

impl AccumTexel {
    fn zeroed() -> Self {
        Self {
            chan: [
                AtomicU32::new(0),
                AtomicU32::new(0),
                AtomicU32::new(0),
                AtomicU32::new(0),
            ],
        }
    }

    fn load(&self) -> Vec4 {
        Vec4::new(
            f32::from_bits(self.chan[0].load(Ordering::Relaxed)),
            f32::from_bits(self.chan[1].load(Ordering::Relaxed)),
            f32::from_bits(self.chan[2].load(Ordering::Relaxed)),
            f32::from_bits(self.chan[3].load(Ordering::Relaxed)),
        )
    }
}

pub(crate) struct Weighted {
    params: WboitWeights,
    accum: Vec<AccumTexel>,
    reveal: Vec<AtomicU32>,
}

impl Weighted {
    pub fn new(texel_count: usize, params: WboitWeights) -> Self {
        let mut accum = Vec::with_capacity(texel_count);
        accum.resize_with(texel_count, AccumTexel::zeroed);
        let mut reveal = Vec::with_capacity(texel_count);
        reveal.resize_with(texel_count, || AtomicU32::new(1.0f32.to_bits()));
        Self {
            params,
            accum,
            reveal,
        }
    }

    #[cfg(test)]
    fn channels(&self, texel: usize) -> (Vec4, f32) {
        (
            self.accum[texel].load(),
            f32::from_bits(self.reveal[texel].load(Ordering::Relaxed)),
        )
    }
}

impl Technique for Weighted {
    fn clear(&mut self) {
        for t in &self.accum {
            for c in &t.chan {
                c.store(0, Ordering::Relaxed);
            }
        }
        for r in &self.reveal {
            r.store(1.0f32.to_bits(), Ordering::Relaxed);
        }
    }

    fn insert(&self, _slot: usize, frag: &Fragment, _seq: u32, ctx: &EmitCtx<'_>) {
        let alpha = frag.color.w;
        let w = self.params.weight(frag.depth, alpha);
        let add = Vec4::new(
            frag.color.x * alpha * w,
            frag.color.y * alpha * w,
            frag.color.z * alpha * w,
            alpha * w,
        );
        let mut mask = ctx.lane_mask(frag.coverage);
        while mask != 0 {
            let lane = mask.trailing_zeros();
            let texel = ctx.target.texel_index(ctx.x, ctx.y, lane);
            for (cell, v) in self.accum[texel].chan.iter().zip([add.x, add.y, add.z, add.w]) {
                atomic_add_f32(cell, v);
            }
            atomic_mul_f32(&self.reveal[texel], 1.0 - alpha);
            mask &= mask - 1;
        }
        ctx.stats.add_stored();
    }

    fn resolve_slot(&self, _slot: usize, ctx: &mut ResolveCtx<'_>) {
        for lane in ctx.lanes() {
            let texel = ctx.target.texel_index(ctx.x, ctx.y, lane);
            let accum = self.accum[texel].load();
            let reveal = f32::from_bits(self.reveal[texel].load(Ordering::Relaxed));
            let avg = accum.truncate() / accum.w.max(REVEAL_EPS);
            let alpha = 1.0 - reveal;
            let out = blend::over(ctx.base(lane), Vec4::new(avg.x, avg.y, avg.z, alpha));
            ctx.write(lane, out);
        }
    }
}
