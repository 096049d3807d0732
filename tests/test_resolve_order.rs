//! Permutation invariance: with capacity for every fragment, each exact
//! algorithm must resolve a slot to the ground-truth depth-sorted
//! back-to-front composite no matter how the fragments arrive. Weighted
//! blending is approximate, so it is held to order independence rather
//! than to the ground truth.

use glam::Vec4;
use glassforge::{Algorithm, Fragment, OitCaps, OitConfig, OitRenderer};

const BACKGROUND: Vec4 = Vec4::new(0.2, 0.2, 0.2, 0.2);

/// Straight-alpha source over premultiplied destination.
fn over(dst: Vec4, src: Vec4) -> Vec4 {
    let a = src.w;
    Vec4::new(
        src.x * a + dst.x * (1.0 - a),
        src.y * a + dst.y * (1.0 - a),
        src.z * a + dst.z * (1.0 - a),
        a + dst.w * (1.0 - a),
    )
}

fn ground_truth(frags: &[Fragment]) -> Vec4 {
    let mut sorted = frags.to_vec();
    sorted.sort_by(|a, b| a.depth.partial_cmp(&b.depth).unwrap());
    let mut acc = BACKGROUND;
    for f in sorted.iter().rev() {
        acc = over(acc, f.color);
    }
    acc
}

fn permutations(frags: &[Fragment]) -> Vec<Vec<Fragment>> {
    if frags.len() <= 1 {
        return vec![frags.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..frags.len() {
        let mut rest = frags.to_vec();
        let head = rest.remove(i);
        for tail in permutations(&rest) {
            let mut p = vec![head];
            p.extend(tail);
            out.push(p);
        }
    }
    out
}

fn renderer(algorithm: Algorithm) -> OitRenderer {
    let config = OitConfig {
        algorithm,
        width: 2,
        height: 2,
        layers: 8,
        ..OitConfig::default()
    };
    OitRenderer::with_caps(&config, &OitCaps::all()).unwrap()
}

fn render_order(r: &mut OitRenderer, order: &[Fragment]) -> Vec4 {
    r.begin_frame(BACKGROUND);
    if r.needs_depth_pass() {
        for f in order {
            r.emit_depth(1, 1, f.depth);
        }
    }
    for f in order {
        r.emit(1, 1, *f);
    }
    r.resolve();
    r.pixel(1, 1)
}

fn assert_close(a: Vec4, b: Vec4, eps: f32, what: &str) {
    for i in 0..4 {
        assert!(
            (a[i] - b[i]).abs() <= eps,
            "{what}: channel {i}: {a:?} vs {b:?}"
        );
    }
}

// Channels quantize exactly through the RGBA8 A-buffer.
fn fixture() -> Vec<Fragment> {
    vec![
        Fragment::new(Vec4::new(0.8, 0.2, 0.0, 0.6), 0.4),
        Fragment::new(Vec4::new(0.0, 0.8, 0.2, 0.4), 0.2),
        Fragment::new(Vec4::new(0.2, 0.0, 0.8, 0.8), 0.1),
        Fragment::new(Vec4::new(0.4, 0.4, 0.4, 0.2), 0.3),
    ]
}

#[test]
fn exact_variants_match_ground_truth_for_every_permutation() {
    let frags = fixture();
    let expect = ground_truth(&frags);
    for algorithm in [
        Algorithm::Simple,
        Algorithm::LinkedList,
        Algorithm::Loop,
        Algorithm::Loop64,
        Algorithm::Spinlock,
        Algorithm::Interlock,
    ] {
        let mut r = renderer(algorithm);
        for order in permutations(&frags) {
            let got = render_order(&mut r, &order);
            assert_close(got, expect, 1e-5, &format!("{algorithm:?} {order:?}"));
        }
    }
}

#[test]
fn weighted_is_order_independent() {
    let frags = fixture();
    let mut r = renderer(Algorithm::Weighted);
    let reference = render_order(&mut r, &frags);
    for order in permutations(&frags) {
        let got = render_order(&mut r, &order);
        assert_close(got, reference, 1e-5, "weighted permutation");
    }
}

#[test]
fn resolve_is_idempotent() {
    for algorithm in [
        Algorithm::Simple,
        Algorithm::LinkedList,
        Algorithm::Loop,
        Algorithm::Loop64,
        Algorithm::Spinlock,
        Algorithm::Interlock,
        Algorithm::Weighted,
    ] {
        let mut r = renderer(algorithm);
        r.begin_frame(BACKGROUND);
        if r.needs_depth_pass() {
            for f in &fixture() {
                r.emit_depth(1, 1, f.depth);
            }
        }
        for f in &fixture() {
            r.emit(1, 1, *f);
        }
        r.resolve();
        let first = r.pixels();
        r.resolve();
        assert_eq!(first, r.pixels(), "{algorithm:?}");
    }
}

#[test]
fn untouched_pixels_keep_the_background() {
    let mut r = renderer(Algorithm::Simple);
    let got = render_order(&mut r, &fixture());
    assert_ne!(got, BACKGROUND);
    assert_eq!(r.pixel(0, 0), BACKGROUND);
    assert_eq!(r.pixel(1, 0), BACKGROUND);
}
