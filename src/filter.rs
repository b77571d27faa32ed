// filter.rs — Kernelized correlation filter: train, detect, update.
//
// Everything happens in the frequency domain on spectra of windowed
// feature maps. With X the training spectrum, Z the test spectrum and
// n = rows·cols:
//
//   kernel:  k(τ) = exp( −max(0, ‖x‖² + ‖z‖² − 2·(x ⋆ z)(τ)) / (σ²·n) )
//            where x ⋆ z = IDFT(Σ_c Z_c · conj(X_c)), K = DFT(k)
//   train:   α = Y / (Re(K_xx) + λ)                  (Y = label spectrum)
//   detect:  r = Re(IDFT(α ⊙ K_zx)), peak = argmax r, refined sub-pixel
//   update:  model ← (1−η)·model + η·model_new       (features and α)
//
// A response computed on the training patch itself reproduces the label,
// so zero displacement peaks at the label center ((n−1)/2 on each axis)
// and a shift of δ moves the peak by δ.
//
// Sub-pixel refinement fits f(u,v) = a·u² + b·uv + c·v² + d·u + e·v + f
// to the 3×3 neighborhood of the integer peak by least squares and takes
// the analytic extremum. The fit is skipped (integer peak kept) when the
// peak touches the border, the surface is not a maximum, or the offset
// leaves the neighborhood.

use num_complex::Complex32;
use tracing::warn;

use crate::fft::{Fft2, Spectrum};
use crate::image::Image;

/// Determinant threshold below which the quadratic fit is treated as flat.
const FIT_EPSILON: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Kernel, train, detect
// ---------------------------------------------------------------------------

/// Gaussian kernel correlation between two multi-channel spectra.
///
/// When `auto` is set, `y` must be `x` and its norm is reused.
///
/// # Panics
/// Panics if the spectra have different shapes or do not match `fft`.
pub fn gaussian_kernel(fft: &Fft2, x: &Spectrum, y: &Spectrum, sigma: f32, auto: bool) -> Vec<Complex32> {
    assert!(x.same_shape(y), "kernel inputs must share a shape");
    assert!(
        x.rows == fft.rows() && x.cols == fft.cols(),
        "spectrum {}×{} does not match transform {}×{}",
        x.rows,
        x.cols,
        fft.rows(),
        fft.cols(),
    );

    let n = fft.plane_len();
    let x_norm = x.energy() / n as f64;
    let y_norm = if auto { x_norm } else { y.energy() / n as f64 };

    // Cross-power spectrum summed over channels.
    let mut xy_f = vec![Complex32::new(0.0, 0.0); n];
    for k in 0..x.channels {
        for ((acc, &a), &b) in xy_f.iter_mut().zip(x.channel(k)).zip(y.channel(k)) {
            *acc += a * b.conj();
        }
    }
    let xy = fft.inverse_real(&xy_f);

    let scale = -1.0 / (sigma as f64 * sigma as f64) / n as f64;
    let k: Vec<f32> = xy
        .iter()
        .map(|&c| {
            let d = (x_norm + y_norm - 2.0 * c as f64).max(0.0);
            (d * scale).exp() as f32
        })
        .collect();
    fft.forward_real(&k)
}

/// Ridge regression in the dual: `α = label / (Re(K_xx) + λ)`.
pub fn train(fft: &Fft2, x: &Spectrum, label_f: &[Complex32], sigma: f32, lambda: f32) -> Spectrum {
    let k = gaussian_kernel(fft, x, x, sigma, true);
    let alpha: Vec<Complex32> = label_f
        .iter()
        .zip(&k)
        .map(|(&g, kk)| g / (kk.re + lambda))
        .collect();
    Spectrum::from_plane(x.rows, x.cols, alpha)
}

/// Location and height of the response maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Column, sub-pixel when refinement succeeded.
    pub x: f32,
    /// Row, sub-pixel when refinement succeeded.
    pub y: f32,
    /// Response value at the integer maximum.
    pub value: f32,
    /// Whether the quadratic refinement was applied.
    pub subpixel: bool,
}

/// Result of running a filter over a test spectrum.
#[derive(Debug, Clone)]
pub struct Detection {
    pub response: Image<f32>,
    pub peak: Peak,
}

/// Evaluate the filter on `z` and locate the response peak.
pub fn detect(fft: &Fft2, z: &Spectrum, model: &Spectrum, alpha: &Spectrum, sigma: f32) -> Detection {
    let k = gaussian_kernel(fft, z, model, sigma, false);
    let prod: Vec<Complex32> = alpha.data.iter().zip(&k).map(|(&a, &b)| a * b).collect();
    let response = Image::from_vec(fft.cols(), fft.rows(), fft.inverse_real(&prod));
    let peak = subpixel_peak(&response);
    Detection { response, peak }
}

/// First maximum in row-major order, refined to sub-pixel when possible.
///
/// # Panics
/// Panics if the response is empty.
pub fn subpixel_peak(response: &Image<f32>) -> Peak {
    assert!(!response.is_empty(), "empty response map");

    let (mut px, mut py, mut best) = (0usize, 0usize, f32::NEG_INFINITY);
    for (x, y, v) in response.pixels() {
        if v > best {
            best = v;
            px = x;
            py = y;
        }
    }

    let integer = Peak { x: px as f32, y: py as f32, value: best, subpixel: false };

    let (w, h) = (response.width(), response.height());
    if px == 0 || py == 0 || px + 1 >= w || py + 1 >= h {
        warn!(x = px, y = py, "response peak on border, keeping integer location");
        return integer;
    }

    match fit_quadratic_peak(response, px, py) {
        Some((dx, dy)) => Peak {
            x: px as f32 + dx as f32,
            y: py as f32 + dy as f32,
            value: best,
            subpixel: true,
        },
        None => {
            warn!(x = px, y = py, "quadratic peak fit degenerate, keeping integer location");
            integer
        }
    }
}

/// Least-squares quadratic surface over the 3×3 neighborhood of (px, py).
///
/// Returns the extremum offset, or `None` if the surface has no maximum
/// inside the neighborhood. The fit is not shift-equivariant: it leans
/// toward the integer argmax by up to ~0.1 cell.
fn fit_quadratic_peak(response: &Image<f32>, px: usize, py: usize) -> Option<(f64, f64)> {
    // Normal equations AᵀA·p = Aᵀf with rows [u², uv, v², u, v, 1].
    let mut ata = [[0.0f64; 6]; 6];
    let mut atf = [0.0f64; 6];
    for v in -1i32..=1 {
        for u in -1i32..=1 {
            let f = response.get((px as i32 + u) as usize, (py as i32 + v) as usize) as f64;
            let (uf, vf) = (u as f64, v as f64);
            let row = [uf * uf, uf * vf, vf * vf, uf, vf, 1.0];
            for i in 0..6 {
                atf[i] += row[i] * f;
                for j in 0..6 {
                    ata[i][j] += row[i] * row[j];
                }
            }
        }
    }
    let [a, b, c, d, e, _] = solve6(ata, atf)?;

    // Stationary point of the fitted surface.
    let det = 4.0 * a * c - b * b;
    if det <= FIT_EPSILON || a >= 0.0 {
        return None;
    }
    let dx = (b * e - 2.0 * c * d) / det;
    let dy = (b * d - 2.0 * a * e) / det;
    if !dx.is_finite() || !dy.is_finite() || dx.abs() > 1.0 || dy.abs() > 1.0 {
        return None;
    }
    Some((dx, dy))
}

/// Gaussian elimination with partial pivoting on a 6×6 system.
///
/// AᵀA over the fixed 3×3 grid is constant and well conditioned, so solving
/// the normal equations directly is as accurate here as an SVD least-squares
/// solve and needs no linear-algebra crate.
fn solve6(mut m: [[f64; 6]; 6], mut rhs: [f64; 6]) -> Option<[f64; 6]> {
    for col in 0..6 {
        let pivot = (col..6).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if m[pivot][col].abs() < FIT_EPSILON {
            return None;
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        for r in col + 1..6 {
            let f = m[r][col] / m[col][col];
            for k in col..6 {
                m[r][k] -= f * m[col][k];
            }
            rhs[r] -= f * rhs[col];
        }
    }
    let mut out = [0.0f64; 6];
    for i in (0..6).rev() {
        let tail: f64 = (i + 1..6).map(|k| m[i][k] * out[k]).sum();
        out[i] = (rhs[i] - tail) / m[i][i];
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// CorrelationFilter
// ---------------------------------------------------------------------------

/// Learned appearance: feature spectrum and dual coefficients, always
/// updated together.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterModel {
    pub features: Spectrum,
    pub alpha: Spectrum,
}

impl FilterModel {
    /// EMA update of both spectra toward `fresh`.
    pub fn blend(&mut self, fresh: &FilterModel, rate: f32) {
        self.features.blend(&fresh.features, rate);
        self.alpha.blend(&fresh.alpha, rate);
    }
}

/// A filter engine bound to one pattern size: planned FFT, label
/// spectrum and kernel parameters. Immutable after construction.
#[derive(Debug, Clone)]
pub struct CorrelationFilter {
    fft: Fft2,
    label_f: Vec<Complex32>,
    sigma: f32,
    lambda: f32,
}

impl CorrelationFilter {
    /// Engine for `label.height() × label.width()` planes.
    pub fn new(label: &Image<f32>, sigma: f32, lambda: f32) -> Self {
        let fft = Fft2::new(label.height(), label.width());
        let label_f = fft.forward_real(label.as_slice());
        CorrelationFilter { fft, label_f, sigma, lambda }
    }

    pub fn fft(&self) -> &Fft2 {
        &self.fft
    }

    pub fn label_spectrum(&self) -> &[Complex32] {
        &self.label_f
    }

    /// Fresh model from a training spectrum.
    pub fn train(&self, features: Spectrum) -> FilterModel {
        let alpha = train(&self.fft, &features, &self.label_f, self.sigma, self.lambda);
        FilterModel { features, alpha }
    }

    pub fn detect(&self, z: &Spectrum, model: &FilterModel) -> Detection {
        detect(&self.fft, z, &model.features, &model.alpha, self.sigma)
    }
}
