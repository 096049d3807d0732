//! Multisampling paths: coverage shading (per-pixel slots with coverage
//! masks) and sample shading (per-sample slots).

use glam::Vec4;
use glassforge::{AaMode, Algorithm, Fragment, OitCaps, OitConfig, OitRenderer};

const BACKGROUND: Vec4 = Vec4::new(0.2, 0.2, 0.2, 1.0);

fn over(dst: Vec4, src: Vec4) -> Vec4 {
    let a = src.w;
    Vec4::new(
        src.x * a + dst.x * (1.0 - a),
        src.y * a + dst.y * (1.0 - a),
        src.z * a + dst.z * (1.0 - a),
        a + dst.w * (1.0 - a),
    )
}

fn assert_close(a: Vec4, b: Vec4, eps: f32, what: &str) {
    for i in 0..4 {
        assert!(
            (a[i] - b[i]).abs() <= eps,
            "{what}: channel {i}: {a:?} vs {b:?}"
        );
    }
}

fn renderer(algorithm: Algorithm, aa: AaMode) -> OitRenderer {
    let config = OitConfig {
        algorithm,
        width: 1,
        height: 1,
        layers: 4,
        aa,
        ..OitConfig::default()
    };
    OitRenderer::with_caps(&config, &OitCaps::all()).unwrap()
}

/// Two fragments covering disjoint sample halves resolve to the average of
/// two half-covered blends.
#[test]
fn coverage_masks_split_the_pixel() {
    for algorithm in [Algorithm::Simple, Algorithm::Spinlock, Algorithm::LinkedList] {
        let mut r = renderer(algorithm, AaMode::Msaa4x);
        r.begin_frame(BACKGROUND);
        let red = Vec4::new(0.8, 0.0, 0.0, 0.6);
        let blue = Vec4::new(0.0, 0.0, 0.8, 0.6);
        r.emit(0, 0, Fragment::with_coverage(red, 0.3, 0b0011));
        r.emit(0, 0, Fragment::with_coverage(blue, 0.5, 0b1100));
        r.resolve();

        let lane_red = over(BACKGROUND, red);
        let lane_blue = over(BACKGROUND, blue);
        let expect = (lane_red + lane_blue) / 2.0;
        assert_close(r.pixel(0, 0), expect, 1e-5, &format!("{algorithm:?} split"));
    }
}

/// Overlapping coverage composites both fragments on the shared lanes only.
#[test]
fn overlapping_coverage_blends_depth_sorted_per_lane() {
    let mut r = renderer(Algorithm::Spinlock, AaMode::Msaa4x);
    r.begin_frame(BACKGROUND);
    let red = Vec4::new(0.8, 0.0, 0.0, 0.6);
    let blue = Vec4::new(0.0, 0.0, 0.8, 0.6);
    // Red is nearer and covers all lanes; blue covers the top half.
    r.emit(0, 0, Fragment::with_coverage(red, 0.3, 0b1111));
    r.emit(0, 0, Fragment::with_coverage(blue, 0.5, 0b1100));
    r.resolve();

    let lane_plain = over(BACKGROUND, red);
    let lane_both = over(over(BACKGROUND, blue), red);
    let expect = (lane_plain * 2.0 + lane_both * 2.0) / 4.0;
    assert_close(r.pixel(0, 0), expect, 1e-5, "overlap");
}

/// Under sample shading every sample owns a slot; per-sample emissions
/// stay isolated and the pixel is their box average.
#[test]
fn sample_shading_slots_are_independent() {
    let mut r = renderer(Algorithm::Spinlock, AaMode::Ssaa4x);
    r.begin_frame(BACKGROUND);
    let colors = [
        Vec4::new(0.8, 0.0, 0.0, 0.6),
        Vec4::new(0.0, 0.8, 0.0, 0.6),
        Vec4::new(0.0, 0.0, 0.8, 0.6),
        Vec4::new(0.8, 0.8, 0.0, 0.6),
    ];
    for (s, c) in colors.iter().enumerate() {
        r.emit_sample(0, 0, s as u32, Fragment::new(*c, 0.3));
    }
    r.resolve();

    let mut expect = Vec4::ZERO;
    for c in &colors {
        expect += over(BACKGROUND, *c);
    }
    expect /= 4.0;
    assert_close(r.pixel(0, 0), expect, 1e-5, "sample shading");

    for (s, c) in colors.iter().enumerate() {
        assert_close(
            r.sample_color(0, 0, s as u32),
            over(BACKGROUND, *c),
            1e-5,
            "per-sample color",
        );
    }
}

/// Weighted accumulation respects coverage: an uncovered lane keeps the
/// background.
#[test]
fn weighted_honors_coverage() {
    let mut r = renderer(Algorithm::Weighted, AaMode::Msaa4x);
    r.begin_frame(BACKGROUND);
    let red = Vec4::new(0.8, 0.0, 0.0, 0.6);
    r.emit(0, 0, Fragment::with_coverage(red, 0.3, 0b0001));
    r.resolve();

    assert_eq!(r.sample_color(0, 0, 1), BACKGROUND);
    assert_eq!(r.sample_color(0, 0, 3), BACKGROUND);
    let covered = r.sample_color(0, 0, 0);
    assert!(covered.x > BACKGROUND.x);
}
