//! Compositing math.
//!
//! The destination is kept premultiplied throughout the pipeline:
//! (c, a) over (d, b) = (c + (1-a)d, a + (1-a)b), with c the source color
//! already scaled by its alpha.

use glam::Vec4;

/// Blend a straight-alpha source over a premultiplied destination.
pub fn over(dst: Vec4, src: Vec4) -> Vec4 {
    let a = src.w;
    let inv = 1.0 - a;
    Vec4::new(
        src.x * a + dst.x * inv,
        src.y * a + dst.y * inv,
        src.z * a + dst.z * inv,
        a + dst.w * inv,
    )
}
