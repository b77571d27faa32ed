// hog.rs — UoCTTi-style histogram of oriented gradients.
//
// A descriptor is built once per session and reused for every patch of
// the same size. For each interior pixel:
//
//   1. Central-difference gradient (dx, dy), optionally through a √I
//      gamma lookup table.
//   2. Signed angle in [0, 2π) from a polynomial atan2, mapped onto
//      2·nO directed bins with linear interpolation between neighbors.
//   3. Magnitude split bilinearly into the up-to-4 cells that share
//      the pixel.
//
// Each cell is then normalized against the four 2×2 blocks it belongs
// to. The output has 3·nO + 4 channels:
//
//   [0, nO)        directed bins 0..nO        (each block clamped at 0.2, averaged)
//   [nO, 2nO)      directed bins nO..2nO
//   [2nO, 3nO)     undirected bins (opposite directions summed)
//   [3nO, 3nO+4)   texture energy, one per block, scaled by 1/√18
//
// Cell grid size is `(dim + cell/2) / cell` along each axis, so a 32×32
// patch with 4-pixel cells yields 8×8 cells.
//
// NEW RUST CONCEPTS:
// - Reusable scratch buffers (`HogBuffers`) passed as `&mut`, so the
//   descriptor itself stays immutable and shareable.
// - `Option<Vec<_>>` for optional precomputed tables (gamma LUT, glyphs).

use std::f32::consts::PI;

use crate::error::{Result, TrackError};
use crate::features::FeatureMap;
use crate::image::Image;

/// Side length of one rendered orientation glyph, in pixels.
pub const GLYPH_SIZE: usize = 21;

/// Per-block clamp applied before averaging.
const BLOCK_CLAMP: f32 = 0.2;

/// Regularizer added to each block energy before the inverse square root.
const BLOCK_EPSILON: f32 = 1e-4;

const ATAN_EPSILON: f32 = 1.192_092_9e-7;

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// HOG descriptor: immutable parameters plus optional lookup tables.
#[derive(Debug, Clone)]
pub struct HogDescriptor {
    cell_size: usize,
    n_orient: usize,
    dimension: usize,
    /// √i for i in 0..256, when gamma correction is enabled.
    gamma_lut: Option<Vec<f32>>,
    /// nO glyphs of GLYPH_SIZE² bytes (0 or 1), when rendering is enabled.
    glyphs: Option<Vec<u8>>,
}

/// Scratch histograms reused across `compute_with` calls.
///
/// Resized automatically when the cell grid changes; otherwise only
/// zeroed, so steady-state extraction does not allocate.
#[derive(Debug, Clone, Default)]
pub struct HogBuffers {
    hist: Vec<f32>,
    norm: Vec<f32>,
}

impl HogDescriptor {
    /// Build a descriptor.
    ///
    /// Returns `TrackError::Config` if `cell_size` or `n_orientations` is zero.
    pub fn new(
        cell_size: usize,
        n_orientations: usize,
        want_glyphs: bool,
        gamma_correction: bool,
    ) -> Result<Self> {
        if cell_size < 1 {
            return Err(TrackError::Config("HOG cell size must be at least 1".into()));
        }
        if n_orientations < 1 {
            return Err(TrackError::Config("HOG needs at least one orientation".into()));
        }

        let gamma_lut = gamma_correction.then(|| (0..256).map(|i| (i as f32).sqrt()).collect());
        let glyphs = want_glyphs.then(|| build_glyphs(n_orientations));

        Ok(HogDescriptor {
            cell_size,
            n_orient: n_orientations,
            dimension: 3 * n_orientations + 4,
            gamma_lut,
            glyphs,
        })
    }

    pub fn cell_size(&self) -> usize {
        self.cell_size
    }

    pub fn orientations(&self) -> usize {
        self.n_orient
    }

    /// Number of output channels, `3·nO + 4`.
    pub fn channels(&self) -> usize {
        self.dimension
    }

    /// Cell columns for an image of the given width.
    pub fn feature_cols(&self, width: usize) -> usize {
        (width + self.cell_size / 2) / self.cell_size
    }

    /// Cell rows for an image of the given height.
    pub fn feature_rows(&self, height: usize) -> usize {
        (height + self.cell_size / 2) / self.cell_size
    }

    /// Total number of floats `compute` produces for a `width × height` image.
    pub fn feature_size(&self, width: usize, height: usize) -> usize {
        self.feature_cols(width) * self.feature_rows(height) * self.dimension
    }

    /// Rendered visualization size, or `None` when built without glyphs.
    pub fn render_size(&self, width: usize, height: usize) -> Option<(usize, usize)> {
        self.glyphs.as_ref().map(|_| {
            (self.feature_cols(width) * GLYPH_SIZE, self.feature_rows(height) * GLYPH_SIZE)
        })
    }

    /// Compute features with freshly allocated scratch buffers.
    pub fn compute(&self, image: &Image<u8>) -> Result<FeatureMap> {
        self.compute_with(image, &mut HogBuffers::default())
    }

    /// Compute features for `image`, reusing `buffers` between calls.
    ///
    /// Returns `TrackError::ImageTooSmall` unless both sides exceed 3 pixels.
    pub fn compute_with(&self, image: &Image<u8>, buffers: &mut HogBuffers) -> Result<FeatureMap> {
        let (w, h) = (image.width(), image.height());
        if w <= 3 || h <= 3 {
            return Err(TrackError::ImageTooSmall { width: w, height: h });
        }

        let hist_w = self.feature_cols(w);
        let hist_h = self.feature_rows(h);
        let stride = hist_w * hist_h;
        buffers.prepare(stride, self.n_orient);

        self.accumulate(image, hist_w, hist_h, &mut buffers.hist);

        // Energy of the undirected histogram per cell.
        let layer = stride * self.n_orient;
        for k in 0..self.n_orient {
            let base = k * stride;
            for (i, n) in buffers.norm.iter_mut().enumerate() {
                let s = buffers.hist[base + i] + buffers.hist[base + layer + i];
                *n += s * s;
            }
        }

        let mut data = vec![0.0f32; stride * self.dimension];
        self.normalize(&buffers.hist, &buffers.norm, hist_w, hist_h, &mut data);

        Ok(FeatureMap::Multi {
            channels: self.dimension,
            rows: hist_h,
            cols: hist_w,
            data,
        })
    }

    /// Gradient orientation voting into the per-cell directed histograms.
    fn accumulate(&self, image: &Image<u8>, hist_w: usize, hist_h: usize, hist: &mut [f32]) {
        let (w, h) = (image.width(), image.height());
        let nbins = 2 * self.n_orient;
        let angle_scale = self.n_orient as f32 / PI;
        let inv_cell = 1.0 / self.cell_size as f32;
        let stride = hist_w * hist_h;

        let level = |v: u8| -> f32 {
            match &self.gamma_lut {
                Some(lut) => lut[v as usize],
                None => v as f32,
            }
        };

        for y in 1..h - 1 {
            let prev = image.row(y - 1);
            let cur = image.row(y);
            let next = image.row(y + 1);

            let cell_y = y as f32 * inv_cell;
            let cy = (cell_y.floor() as usize).min(hist_h - 1);
            let wy2 = cell_y - cell_y.floor();
            let wy1 = 1.0 - wy2;

            for x in 1..w - 1 {
                let dx = level(cur[x + 1]) - level(cur[x - 1]);
                let dy = level(next[x]) - level(prev[x]);
                let mag = (dx * dx + dy * dy).sqrt();

                let angle = fast_atan2(dy, dx) * angle_scale;
                let lower = angle.floor();
                let frac = angle - lower;
                let b0 = (lower as i64).rem_euclid(nbins as i64) as usize;
                let b1 = if b0 + 1 < nbins { b0 + 1 } else { 0 };
                let g0 = mag * (1.0 - frac);
                let g1 = mag * frac;

                let cell_x = x as f32 * inv_cell;
                let cx = (cell_x.floor() as usize).min(hist_w - 1);
                let wx2 = cell_x - cell_x.floor();
                let wx1 = 1.0 - wx2;

                let mut vote = |cx: usize, cy: usize, wgt: f32| {
                    let at = cx + cy * hist_w;
                    hist[at + b0 * stride] += g0 * wgt;
                    hist[at + b1 * stride] += g1 * wgt;
                };

                let has_right = cx + 1 < hist_w;
                let has_below = cy + 1 < hist_h;
                match (has_right, has_below) {
                    (true, true) => {
                        vote(cx, cy, wx1 * wy1);
                        vote(cx + 1, cy, wx2 * wy1);
                        vote(cx, cy + 1, wx1 * wy2);
                        vote(cx + 1, cy + 1, wx2 * wy2);
                    }
                    // Bottom row of cells: spread horizontally only.
                    (true, false) => {
                        vote(cx, cy, wx1);
                        vote(cx + 1, cy, wx2);
                    }
                    // Right column of cells: spread vertically only.
                    (false, true) => {
                        vote(cx, cy, wy1);
                        vote(cx, cy + 1, wy2);
                    }
                    (false, false) => vote(cx, cy, 1.0),
                }
            }
        }
    }

    /// Block normalization; writes all `dimension` channels into `out`.
    fn normalize(&self, hist: &[f32], norm: &[f32], hist_w: usize, hist_h: usize, out: &mut [f32]) {
        let stride = hist_w * hist_h;
        let n_o = self.n_orient;
        let div_sqrt18 = 1.0 / 18f32.sqrt();
        let at_norm = |x: usize, y: usize| norm[x + y * hist_w];

        for y in 0..hist_h {
            let ym = y.saturating_sub(1);
            let yp = (y + 1).min(hist_h - 1);
            for x in 0..hist_w {
                let xm = x.saturating_sub(1);
                let xp = (x + 1).min(hist_w - 1);

                let n1 = at_norm(xm, ym);
                let n2 = at_norm(x, ym);
                let n3 = at_norm(xp, ym);
                let n4 = at_norm(xm, y);
                let n5 = at_norm(x, y);
                let n6 = at_norm(xp, y);
                let n7 = at_norm(xm, yp);
                let n8 = at_norm(x, yp);
                let n9 = at_norm(xp, yp);

                // One factor per 2×2 block containing this cell.
                let factors = [
                    1.0 / (n1 + n2 + n4 + n5 + BLOCK_EPSILON).sqrt(),
                    1.0 / (n2 + n3 + n5 + n6 + BLOCK_EPSILON).sqrt(),
                    1.0 / (n4 + n5 + n7 + n8 + BLOCK_EPSILON).sqrt(),
                    1.0 / (n5 + n6 + n8 + n9 + BLOCK_EPSILON).sqrt(),
                ];

                let cell = x + y * hist_w;
                let mut texture = [0.0f32; 4];
                for k in 0..n_o {
                    let ha = hist[cell + k * stride];
                    let hb = hist[cell + (k + n_o) * stride];

                    let (mut sa, mut sb, mut sc) = (0.0f32, 0.0f32, 0.0f32);
                    for (t, &f) in texture.iter_mut().zip(&factors) {
                        let a = f * ha;
                        let b = f * hb;
                        let c = (a + b).min(BLOCK_CLAMP);
                        sa += a.min(BLOCK_CLAMP);
                        sb += b.min(BLOCK_CLAMP);
                        sc += c;
                        *t += c;
                    }

                    out[cell + k * stride] = 0.25 * sa;
                    out[cell + (k + n_o) * stride] = 0.25 * sb;
                    out[cell + (k + 2 * n_o) * stride] = 0.25 * sc;
                }
                for (i, t) in texture.iter().enumerate() {
                    out[cell + (3 * n_o + i) * stride] = div_sqrt18 * t;
                }
            }
        }
    }

    /// Render a feature map as oriented line glyphs, one per cell.
    ///
    /// Returns `None` when the descriptor was built without glyphs.
    ///
    /// # Panics
    /// Panics if `features` does not have this descriptor's channel count.
    pub fn render(&self, features: &FeatureMap) -> Option<Image<u8>> {
        let glyphs = self.glyphs.as_ref()?;
        assert_eq!(
            features.channels(),
            self.dimension,
            "feature map has {} channels, descriptor produces {}",
            features.channels(),
            self.dimension,
        );

        let (rows, cols) = (features.rows(), features.cols());
        let n_o = self.n_orient;
        let g2 = GLYPH_SIZE * GLYPH_SIZE;
        let mut out = Image::new(cols * GLYPH_SIZE, rows * GLYPH_SIZE);
        let mut acc = vec![0.0f32; g2];

        for y in 0..rows {
            for x in 0..cols {
                acc.iter_mut().for_each(|v| *v = 0.0);
                let (mut lo, mut hi) = (0.0f32, 0.0f32);
                for k in 0..n_o {
                    let weight = features.at(k, y, x)
                        + features.at(k + n_o, y, x)
                        + features.at(k + 2 * n_o, y, x);
                    lo = lo.min(weight);
                    hi = hi.max(weight);
                    let glyph = &glyphs[k * g2..(k + 1) * g2];
                    for (a, &g) in acc.iter_mut().zip(glyph) {
                        *a += weight * g as f32;
                    }
                }

                let range = hi - lo;
                for gy in 0..GLYPH_SIZE {
                    for gx in 0..GLYPH_SIZE {
                        let v = acc[gx + gy * GLYPH_SIZE].clamp(lo, hi);
                        let px = if range > 0.0 { ((v - lo) * 255.0 / range) as u8 } else { 0 };
                        out.set(x * GLYPH_SIZE + gx, y * GLYPH_SIZE + gy, px);
                    }
                }
            }
        }
        Some(out)
    }
}

impl HogBuffers {
    fn prepare(&mut self, stride: usize, n_orient: usize) {
        let hist_len = stride * 2 * n_orient;
        self.hist.clear();
        self.hist.resize(hist_len, 0.0);
        self.norm.clear();
        self.norm.resize(stride, 0.0);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// One line glyph per undirected orientation, drawn perpendicular to the
/// gradient (i.e. along the edge).
fn build_glyphs(n_orient: usize) -> Vec<u8> {
    let g = GLYPH_SIZE;
    let mut glyphs = vec![0u8; g * g * n_orient];
    let gf = g as f32;

    for k in 0..n_orient {
        let angle = (k as f32 * PI / n_orient as f32 + PI * 0.5) % PI;
        let x2 = gf * angle.cos() * 0.5;
        let y2 = gf * angle.sin() * 0.5;
        let plane = &mut glyphs[k * g * g..(k + 1) * g * g];
        let mut put = |i: i64, j: i64| {
            if (0..g as i64).contains(&i) && (0..g as i64).contains(&j) {
                plane[i as usize + g * j as usize] = 1;
            }
        };

        if angle <= PI / 4.0 || angle >= PI * 3.0 / 4.0 {
            // Mostly horizontal.
            let slope = y2 / x2;
            let offset = (1.0 - slope) * (gf - 1.0) / 2.0;
            let skip = ((1.0 - angle.cos().abs()) * gf / 2.0) as usize;
            for i in skip..g.saturating_sub(skip) {
                let j = (slope * i as f32 + offset + 0.5).floor() as i64;
                put(i as i64, j);
            }
        } else {
            let slope = x2 / y2;
            let offset = (1.0 - slope) * (gf - 1.0) / 2.0;
            let skip = ((1.0 - angle.sin()) * gf / 2.0) as usize;
            for j in skip..g.saturating_sub(skip) {
                let i = (slope * j as f32 + offset + 0.5).floor() as i64;
                put(i, j as i64);
            }
        }
    }
    glyphs
}

/// Polynomial atan2 approximation, result in [0, 2π).
///
/// Maximum error is about 0.005 rad, well below one orientation bin.
#[inline]
pub fn fast_atan2(y: f32, x: f32) -> f32 {
    let x2 = x * x;
    let y2 = y * y;
    if y2 <= x2 {
        let base = if x < 0.0 {
            PI
        } else if y >= 0.0 {
            0.0
        } else {
            2.0 * PI
        };
        x * y / (x2 + 0.28 * y2 + ATAN_EPSILON) + base
    } else {
        let base = if y >= 0.0 { PI * 0.5 } else { PI * 1.5 };
        base - x * y / (y2 + 0.28 * x2 + ATAN_EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertical_edge(size: usize) -> Image<u8> {
        Image::from_fn(size, size, |x, _| if x < size / 2 { 0 } else { 255 })
    }

    #[test]
    fn test_dimension_and_grid() {
        let hog = HogDescriptor::new(4, 9, false, false).unwrap();
        assert_eq!(hog.channels(), 31);
        assert_eq!(hog.feature_cols(32), 8);
        assert_eq!(hog.feature_rows(32), 8);
        assert_eq!(hog.feature_size(32, 32), 31 * 64);
        // Rounds to the nearest cell count.
        assert_eq!(hog.feature_cols(34), 9);
        assert_eq!(hog.feature_cols(33), 8);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(matches!(HogDescriptor::new(0, 9, false, false), Err(TrackError::Config(_))));
        assert!(matches!(HogDescriptor::new(4, 0, false, false), Err(TrackError::Config(_))));
    }

    #[test]
    fn test_rejects_tiny_image() {
        let hog = HogDescriptor::new(4, 9, false, false).unwrap();
        let err = hog.compute(&Image::new(3, 10)).unwrap_err();
        assert!(matches!(err, TrackError::ImageTooSmall { width: 3, height: 10 }));
        assert!(hog.compute(&Image::new(4, 4)).is_ok());
    }

    #[test]
    fn test_flat_image_is_zero() {
        let hog = HogDescriptor::new(4, 9, false, true).unwrap();
        let f = hog.compute(&Image::filled(32, 32, 77)).unwrap();
        assert!(f.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_vertical_edge_votes_bin_zero() {
        let hog = HogDescriptor::new(4, 9, false, false).unwrap();
        let f = hog.compute(&vertical_edge(32)).unwrap();
        let energy = |k: usize| -> f32 { f.channel(k).iter().sum() };

        // Gradient points along +x: angle 0, all weight in bin 0.
        assert!(energy(0) > 0.0, "bin 0 energy = {}", energy(0));
        for k in 1..18 {
            assert!(energy(k).abs() < 1e-6, "bin {k} energy = {}", energy(k));
        }
        // Undirected bin 0 and the texture channels light up too.
        assert!(energy(18) > 0.0);
        assert!(energy(27) > 0.0);
    }

    #[test]
    fn test_values_bounded_by_clamp() {
        let hog = HogDescriptor::new(4, 9, false, false).unwrap();
        let img = Image::from_fn(32, 32, |x, y| ((x * 37 + y * 91) % 256) as u8);
        let f = hog.compute(&img).unwrap();
        for (i, &v) in f.as_slice()[..27 * 64].iter().enumerate() {
            assert!((0.0..=BLOCK_CLAMP + 1e-6).contains(&v), "feature {i} = {v}");
        }
    }

    #[test]
    fn test_buffers_reused_give_same_result() {
        let hog = HogDescriptor::new(4, 9, false, false).unwrap();
        let img = vertical_edge(32);
        let mut buf = HogBuffers::default();
        let a = hog.compute_with(&img, &mut buf).unwrap();
        let b = hog.compute_with(&img, &mut buf).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fast_atan2_accuracy() {
        for i in 0..360 {
            let t = (i as f32 + 0.5).to_radians();
            let (y, x) = (t.sin() * 10.0, t.cos() * 10.0);
            let mut exact = y.atan2(x);
            if exact < 0.0 {
                exact += 2.0 * PI;
            }
            let approx = fast_atan2(y, x);
            assert!((approx - exact).abs() < 0.01, "angle {t}: {approx} vs {exact}");
        }
    }

    #[test]
    fn test_render_requires_glyphs() {
        let plain = HogDescriptor::new(4, 9, false, false).unwrap();
        let f = plain.compute(&vertical_edge(32)).unwrap();
        assert!(plain.render(&f).is_none());
        assert!(plain.render_size(32, 32).is_none());

        let glyph = HogDescriptor::new(4, 9, true, false).unwrap();
        let img = glyph.render(&f).unwrap();
        assert_eq!((img.width(), img.height()), (8 * GLYPH_SIZE, 8 * GLYPH_SIZE));
        assert!(img.pixels().any(|(_, _, v)| v > 0));
    }

    #[test]
    fn test_glyph_zero_is_vertical_line() {
        let glyphs = build_glyphs(9);
        let g = GLYPH_SIZE;
        for j in 0..g {
            assert_eq!(glyphs[g / 2 + g * j], 1, "row {j}");
        }
    }
}
