//! The transparency renderer: per-frame lifecycle around one algorithm.
//!
//! A frame is clear -> emission -> resolve. Emission methods take `&self`
//! and are safe to call from any number of worker threads; the per-slot
//! races are the algorithms' business. The pass boundaries (depth pass to
//! color pass, emission to resolve) are the caller's synchronization
//! points: join the workers of one pass before starting the next.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec4;

#[cfg(target_has_atomic = "64")]
use crate::algorithms::loop64::Loop64;
use crate::algorithms::{
    interlock::Interlock, linked_list::LinkedList, loop32::Loop32, simple::Simple,
    spinlock::Spinlock, weighted::Weighted, EmitCtx, ResolveCtx, Technique,
};
use crate::caps::OitCaps;
use crate::config::{Algorithm, OitConfig};
use crate::error::OitResult;
use crate::fragment::{depth_to_bits, Fragment};
use crate::stats::{FrameStats, StatCounters};
use crate::target::BlendTarget;

pub struct OitRenderer {
    config: OitConfig,
    algorithm: Algorithm,
    technique: Box<dyn Technique>,
    target: BlendTarget,
    /// Resolved colors, one per texel; rebuilt by every resolve.
    out: Vec<Vec4>,
    seq: AtomicU32,
    stats: StatCounters,
    slot_count: usize,
    sample_shading: bool,
    coverage_shading: bool,
}

impl OitRenderer {
    /// Build a renderer for the probed platform capabilities.
    pub fn new(config: &OitConfig) -> OitResult<Self> {
        Self::with_caps(config, OitCaps::get())
    }

    /// Build a renderer against explicit capabilities.
    pub fn with_caps(config: &OitConfig, caps: &OitCaps) -> OitResult<Self> {
        config.validate()?;
        let algorithm = config.resolve_algorithm(caps)?;

        let samples = config.sample_count();
        let sample_shading = config.sample_shading();
        let coverage_shading = config.coverage_shading();
        let slots_per_pixel = if sample_shading { samples } else { 1 };
        let slot_count = (config.width * config.height * slots_per_pixel) as usize;
        let layers = config.layers as usize;

        let technique: Box<dyn Technique> = match algorithm {
            Algorithm::Simple => Box::new(Simple::new(slot_count, layers, coverage_shading)),
            Algorithm::LinkedList => {
                let pool = config
                    .allocated_per_pixel
                    .saturating_mul(config.width)
                    .saturating_mul(config.height)
                    .saturating_mul(slots_per_pixel);
                Box::new(LinkedList::new(slot_count, pool, layers, coverage_shading))
            }
            Algorithm::Loop => Box::new(Loop32::new(slot_count, layers)),
            #[cfg(target_has_atomic = "64")]
            Algorithm::Loop64 => Box::new(Loop64::new(slot_count, layers)),
            // Capability resolution already redirected Loop64 on targets
            // without 64-bit atomics; keep the two-pass loop as a backstop.
            #[cfg(not(target_has_atomic = "64"))]
            Algorithm::Loop64 => Box::new(Loop32::new(slot_count, layers)),
            Algorithm::Spinlock => Box::new(Spinlock::new(slot_count, layers, coverage_shading)),
            Algorithm::Interlock => Box::new(Interlock::new(
                slot_count,
                layers,
                config.interlock_ordered,
                coverage_shading,
            )),
            Algorithm::Weighted => Box::new(Weighted::new(
                (config.width * config.height * samples) as usize,
                config.weights,
            )),
        };

        log::debug!(
            "oit renderer: {:?}, {}x{} x{} samples, {} slots, {} layers",
            algorithm,
            config.width,
            config.height,
            samples,
            slot_count,
            layers
        );

        let texels = (config.width * config.height * samples) as usize;
        Ok(Self {
            config: config.clone(),
            algorithm,
            technique,
            target: BlendTarget::new(config.width, config.height, samples),
            out: vec![Vec4::ZERO; texels],
            seq: AtomicU32::new(0),
            stats: StatCounters::default(),
            slot_count,
            sample_shading,
            coverage_shading,
        })
    }

    /// The algorithm actually running, after any capability fallback.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn config(&self) -> &OitConfig {
        &self.config
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats.snapshot()
    }

    /// Reset all per-frame state and fill the background.
    pub fn begin_frame(&mut self, clear_color: Vec4) {
        self.target.clear(clear_color);
        self.out.fill(clear_color);
        self.technique.clear();
        self.stats.reset();
        self.seq.store(0, Ordering::Relaxed);
    }

    /// Whether fragments must first be streamed through [`Self::emit_depth`].
    pub fn needs_depth_pass(&self) -> bool {
        self.technique.needs_depth_pass()
    }

    /// Depth pre-pass emission. No-op for single-pass algorithms.
    pub fn emit_depth(&self, x: u32, y: u32, depth: f32) {
        if !self.technique.needs_depth_pass() {
            return;
        }
        let slot = self.slot_index(x, y, 0);
        self.technique.insert_depth(slot, depth_to_bits(depth));
    }

    /// Emit one fragment at a pixel.
    pub fn emit(&self, x: u32, y: u32, frag: Fragment) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.emit_inner(x, y, 0, seq, frag);
    }

    /// Emit one fragment at a specific sample; required under sample
    /// shading, where every sample owns its own slot.
    pub fn emit_sample(&self, x: u32, y: u32, sample: u32, frag: Fragment) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.emit_inner(x, y, sample, seq, frag);
    }

    /// Emit with an explicit submission sequence number (primitive order).
    /// This is what the ordered interlock mode keys its tie-breaks on; use
    /// either this or the auto-sequencing emitters within a frame, not both.
    pub fn emit_sequenced(&self, x: u32, y: u32, sample: u32, seq: u32, frag: Fragment) {
        self.emit_inner(x, y, sample, seq, frag);
    }

    fn emit_inner(&self, x: u32, y: u32, sample: u32, seq: u32, frag: Fragment) {
        debug_assert!(sample == 0 || self.sample_shading);
        let slot = self.slot_index(x, y, sample);
        let ctx = EmitCtx {
            target: &self.target,
            stats: &self.stats,
            x,
            y,
            sample,
            sample_shading: self.sample_shading,
            tail_blend: self.config.tail_blend,
        };
        self.technique.insert(slot, &frag, seq, &ctx);
    }

    fn slot_index(&self, x: u32, y: u32, sample: u32) -> usize {
        debug_assert!(x < self.config.width && y < self.config.height);
        ((sample * self.config.height + y) * self.config.width + x) as usize
    }

    fn slot_coords(&self, slot: usize) -> (u32, u32, u32) {
        let plane = (self.config.width * self.config.height) as usize;
        let sample = (slot / plane) as u32;
        let rem = (slot % plane) as u32;
        (rem % self.config.width, rem / self.config.width, sample)
    }

    /// Composite every slot into the output plane. Requires all emission
    /// workers to be joined; recomputes from scratch, so calling it again
    /// without new inserts yields the same image.
    pub fn resolve(&mut self) {
        for slot in 0..self.slot_count {
            let (x, y, sample) = self.slot_coords(slot);
            let mut ctx = ResolveCtx {
                target: &self.target,
                out: &mut self.out,
                x,
                y,
                sample,
                sample_shading: self.sample_shading,
                coverage_shading: self.coverage_shading,
                tail_blend: self.config.tail_blend,
            };
            self.technique.resolve_slot(slot, &mut ctx);
        }
        let stats = self.stats.snapshot();
        log::debug!(
            "frame resolved: {} stored, {} tail-blended, {} discarded, {} pool-exhausted",
            stats.stored,
            stats.tail_blended,
            stats.discarded,
            stats.pool_exhausted
        );
    }

    /// Resolved color of one sample texel.
    pub fn sample_color(&self, x: u32, y: u32, sample: u32) -> Vec4 {
        self.out[self.target.texel_index(x, y, sample)]
    }

    /// Resolved pixel color: the box average of its samples.
    pub fn pixel(&self, x: u32, y: u32) -> Vec4 {
        let samples = self.target.samples();
        let mut acc = Vec4::ZERO;
        for s in 0..samples {
            acc += self.sample_color(x, y, s);
        }
        acc / samples as f32
    }

    /// All resolved pixels, row-major.
    pub fn pixels(&self) -> Vec<Vec4> {
        let mut out = Vec::with_capacity((self.config.width * self.config.height) as usize);
        for y in 0..self.config.height {
            for x in 0..self.config.width {
                out.push(self.pixel(x, y));
            }
        }
        out
    }
}
