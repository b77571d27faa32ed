// tests/test_logpolar.rs — Integration tests for log-polar resampling.
//
// The property the scale channel relies on: scaling the content about the
// source center shifts it along the radius (column) axis by
// (nρ − 1) · ln(scale) / ln(1 / ratio) samples.

use lpkcf::logpolar::{BorderMode, LogPolarGrid};
use lpkcf::Image;

/// Bright disk of the given radius centered in a `size × size` image.
fn disk(size: usize, radius: f32) -> Image<u8> {
    let c = size as f32 * 0.5;
    Image::from_fn(size, size, |x, y| {
        let dx = x as f32 + 0.5 - c;
        let dy = y as f32 + 0.5 - c;
        if dx * dx + dy * dy <= radius * radius { 200 } else { 0 }
    })
}

/// First column whose mean over all angles drops below half brightness.
fn edge_column(polar: &Image<u8>) -> usize {
    (0..polar.width())
        .find(|&i| {
            let sum: u32 = (0..polar.height()).map(|j| polar.get(i, j) as u32).sum();
            sum < 100 * polar.height() as u32
        })
        .unwrap_or(polar.width())
}

// ===== Basic properties =====

#[test]
fn constant_field_preserved_with_replicate() {
    let grid = LogPolarGrid::new(64, 64, 32, 32, 0.2).unwrap();
    assert_eq!(grid.border(), BorderMode::Replicate);
    let out = grid.apply(&Image::filled(64, 64, 128u8));
    assert!(out.pixels().all(|(_, _, v)| v == 128));
}

#[test]
fn zero_border_blanks_far_corners_only() {
    let grid = LogPolarGrid::new(64, 64, 32, 32, 0.2).unwrap().with_border(BorderMode::Zero);
    let out = grid.apply(&Image::filled(64, 64, 128u8));
    // Innermost ring is well inside the source.
    for j in 0..32 {
        assert_eq!(out.get(0, j), 128);
    }
    // The outermost ring reaches half the diagonal, past the edge midpoints.
    assert!((0..32).any(|j| out.get(31, j) == 0));
}

#[test]
fn resampling_is_deterministic() {
    let src = Image::from_fn(48, 40, |x, y| ((x * 31 + y * 17) % 251) as u8);
    let grid = LogPolarGrid::new(48, 40, 24, 36, 0.1).unwrap();
    let a = grid.apply(&src);
    let mut b = Image::new(24, 36);
    grid.apply_into(&src, &mut b);
    assert_eq!(a, b);
}

#[test]
#[should_panic(expected = "grid built for")]
fn wrong_source_size_panics() {
    let grid = LogPolarGrid::new(32, 32, 16, 16, 0.2).unwrap();
    grid.apply(&Image::new(33, 32));
}

// ===== Geometry =====

#[test]
fn radial_image_is_constant_along_angle() {
    let grid = LogPolarGrid::new(64, 64, 32, 32, 0.2).unwrap();
    let cone = Image::from_fn(64, 64, |x, y| {
        let dx = x as f32 - 32.0;
        let dy = y as f32 - 32.0;
        ((dx * dx + dy * dy).sqrt() * 4.0).min(255.0) as u8
    });
    let out = grid.apply(&cone);
    // Radii below ~30 px stay inside the image for every angle.
    for i in 0..20 {
        let (lo, hi) = (0..32).fold((255u8, 0u8), |(lo, hi), j| {
            let v = out.get(i, j);
            (lo.min(v), hi.max(v))
        });
        assert!(hi - lo <= 6, "column {i} spans {lo}..{hi}");
    }
}

#[test]
fn doubling_scale_shifts_along_radius() {
    let n = 64;
    let grid = LogPolarGrid::new(n, n, 32, 32, 0.2).unwrap();
    let small = edge_column(&grid.apply(&disk(n, 12.0)));
    let large = edge_column(&grid.apply(&disk(n, 24.0)));
    // 31 · ln 2 / ln 5 ≈ 13.35 columns.
    let shift = large as i64 - small as i64;
    assert!((12..=15).contains(&shift), "edge moved from {small} to {large}");
}
