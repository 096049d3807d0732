//! The per-sample blend target.
//!
//! Models the color attachment plus the raster-output blend unit: many
//! workers blend into the same texel, and the hardware serializes same-pixel
//! blends. Here a one-word spin per texel provides that serialization;
//! channels are stored premultiplied as f32 bits in atomics so the whole
//! store stays shareable across worker threads.
//!
//! Blend order between different fragments is whatever the race produces,
//! matching the documented nondeterminism of tail blending.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec4;

use crate::blend;

struct Texel {
    chan: [AtomicU32; 4],
}

impl Texel {
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

    fn store(&self, v: Vec4) {
        self.chan[0].store(v.x.to_bits(), Ordering::Relaxed);
        self.chan[1].store(v.y.to_bits(), Ordering::Relaxed);
        self.chan[2].store(v.z.to_bits(), Ordering::Relaxed);
        self.chan[3].store(v.w.to_bits(), Ordering::Relaxed);
    }
}

/// Shared premultiplied color store, one texel per (pixel, sample).
pub struct BlendTarget {
    width: u32,
    height: u32,
    samples: u32,
    locks: Vec<AtomicU32>,
    texels: Vec<Texel>,
}

impl BlendTarget {
    pub fn new(width: u32, height: u32, samples: u32) -> Self {
        let n = (width * height * samples) as usize;
        let mut locks = Vec::with_capacity(n);
        locks.resize_with(n, || AtomicU32::new(0));
        let mut texels = Vec::with_capacity(n);
        texels.resize_with(n, Texel::zeroed);
        Self {
            width,
            height,
            samples,
            locks,
            texels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Texel layout: sample-major planes of row-major pixels.
    pub fn texel_index(&self, x: u32, y: u32, sample: u32) -> usize {
        debug_assert!(x < self.width && y < self.height && sample < self.samples);
        ((sample * self.height + y) * self.width + x) as usize
    }

    /// Reset every texel to the clear color. Exclusive access.
    pub fn clear(&mut self, color: Vec4) {
        for t in &self.texels {
            t.store(color);
        }
    }

    /// Read one texel. Safe against torn reads only outside blend races,
    /// i.e. after emission threads have been joined.
    pub fn load(&self, x: u32, y: u32, sample: u32) -> Vec4 {
        self.texels[self.texel_index(x, y, sample)].load()
    }

    /// Blend a straight-alpha color over one texel, serialized per texel.
    pub fn blend_over(&self, x: u32, y: u32, sample: u32, src: Vec4) {
        let idx = self.texel_index(x, y, sample);
        let lock = &self.locks[idx];
        while lock.swap(1, Ordering::Acquire) == 1 {
            std::hint::spin_loop();
        }
        let t = &self.texels[idx];
        t.store(blend::over(t.load(), src));
        lock.store(0, Ordering::Release);
    }

    /// Box-average the samples of one pixel.
    pub fn resolve_pixel(&self, x: u32, y: u32) -> Vec4 {
        let mut acc = Vec4::ZERO;
        for s in 0..self.samples {
            acc += self.load(x, y, s);
        }
        acc / self.samples as f32
    }
}
