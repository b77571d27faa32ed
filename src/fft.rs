// fft.rs — 2D discrete Fourier transform over feature planes.
//
// rustfft only does 1D transforms, so a 2D transform is rows first, then
// columns:
//
//   plane (rows × cols) ──row FFTs──▶ ──gather column, FFT, scatter──▶ spectrum
//
// Plans are created once per pattern size and shared through `Arc`, so a
// tracker pays the planning cost at init only. The inverse is scaled by
// 1/(rows·cols), which makes `inverse_real(forward(x)) == x`.
//
// `Spectrum` is the frequency-domain counterpart of `FeatureMap`: same
// channel/row/col shape, complex elements.

use std::fmt;
use std::sync::Arc;

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::features::FeatureMap;

// ---------------------------------------------------------------------------
// Fft2
// ---------------------------------------------------------------------------

/// Planned forward and inverse 2D transforms for one plane size.
#[derive(Clone)]
pub struct Fft2 {
    rows: usize,
    cols: usize,
    row_fwd: Arc<dyn Fft<f32>>,
    row_inv: Arc<dyn Fft<f32>>,
    col_fwd: Arc<dyn Fft<f32>>,
    col_inv: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for Fft2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fft2")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

impl Fft2 {
    /// Plan transforms for `rows × cols` planes.
    ///
    /// # Panics
    /// Panics if either side is zero.
    pub fn new(rows: usize, cols: usize) -> Self {
        assert!(rows > 0 && cols > 0, "cannot plan a {rows}×{cols} transform");
        let mut planner = FftPlanner::<f32>::new();
        Fft2 {
            rows,
            cols,
            row_fwd: planner.plan_fft_forward(cols),
            row_inv: planner.plan_fft_inverse(cols),
            col_fwd: planner.plan_fft_forward(rows),
            col_inv: planner.plan_fft_inverse(rows),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Elements per plane.
    pub fn plane_len(&self) -> usize {
        self.rows * self.cols
    }

    /// Forward transform of one real plane.
    pub fn forward_real(&self, plane: &[f32]) -> Vec<Complex32> {
        let mut buf: Vec<Complex32> = plane.iter().map(|&v| Complex32::new(v, 0.0)).collect();
        self.forward(&mut buf);
        buf
    }

    /// In-place forward transform of one complex plane.
    pub fn forward(&self, plane: &mut [Complex32]) {
        self.transform(plane, &*self.row_fwd, &*self.col_fwd);
    }

    /// In-place inverse transform of one complex plane, scaled by 1/n.
    pub fn inverse(&self, plane: &mut [Complex32]) {
        self.transform(plane, &*self.row_inv, &*self.col_inv);
        let scale = 1.0 / self.plane_len() as f32;
        for v in plane.iter_mut() {
            *v *= scale;
        }
    }

    /// Inverse transform keeping only the real part.
    pub fn inverse_real(&self, plane: &[Complex32]) -> Vec<f32> {
        let mut buf = plane.to_vec();
        self.inverse(&mut buf);
        buf.into_iter().map(|c| c.re).collect()
    }

    /// Transform every channel of a feature map.
    ///
    /// # Panics
    /// Panics if the map's planes are not `rows × cols`.
    pub fn forward_map(&self, map: &FeatureMap) -> Spectrum {
        assert!(
            map.rows() == self.rows && map.cols() == self.cols,
            "feature plane {}×{} does not match transform {}×{}",
            map.rows(),
            map.cols(),
            self.rows,
            self.cols,
        );
        let channels = map.channels();
        let mut data = Vec::with_capacity(channels * self.plane_len());
        for k in 0..channels {
            data.extend(self.forward_real(map.channel(k)));
        }
        Spectrum { channels, rows: self.rows, cols: self.cols, data }
    }

    fn transform(&self, plane: &mut [Complex32], row: &dyn Fft<f32>, col: &dyn Fft<f32>) {
        assert_eq!(
            plane.len(),
            self.plane_len(),
            "plane has {} elements, transform expects {}",
            plane.len(),
            self.plane_len(),
        );
        // A buffer holding several rows back to back is processed row by row.
        row.process(plane);

        let mut column = vec![Complex32::new(0.0, 0.0); self.rows];
        for c in 0..self.cols {
            for (r, v) in column.iter_mut().enumerate() {
                *v = plane[r * self.cols + c];
            }
            col.process(&mut column);
            for (r, v) in column.iter().enumerate() {
                plane[r * self.cols + c] = *v;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Spectrum
// ---------------------------------------------------------------------------

/// Complex multi-channel plane stack, laid out like `FeatureMap::Multi`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub channels: usize,
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Complex32>,
}

impl Spectrum {
    /// Single-channel spectrum from an already transformed plane.
    ///
    /// # Panics
    /// Panics if `data.len() != rows * cols`.
    pub fn from_plane(rows: usize, cols: usize, data: Vec<Complex32>) -> Self {
        assert_eq!(data.len(), rows * cols, "plane length must equal rows * cols");
        Spectrum { channels: 1, rows, cols, data }
    }

    pub fn plane_len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn channel(&self, k: usize) -> &[Complex32] {
        let n = self.plane_len();
        &self.data[k * n..(k + 1) * n]
    }

    /// Sum of squared magnitudes over every element, accumulated in f64.
    pub fn energy(&self) -> f64 {
        self.data
            .iter()
            .map(|c| c.re as f64 * c.re as f64 + c.im as f64 * c.im as f64)
            .sum()
    }

    pub fn same_shape(&self, other: &Spectrum) -> bool {
        self.channels == other.channels && self.rows == other.rows && self.cols == other.cols
    }

    /// Exponential moving average: `self ← (1 − rate)·self + rate·other`.
    ///
    /// # Panics
    /// Panics if the shapes differ.
    pub fn blend(&mut self, other: &Spectrum, rate: f32) {
        assert!(self.same_shape(other), "cannot blend spectra of different shapes");
        let keep = 1.0 - rate;
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a = *a * keep + b * rate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_inverse_identity() {
        let fft = Fft2::new(8, 16);
        let plane: Vec<f32> = (0..128).map(|i| ((i * 7) % 13) as f32 - 6.0).collect();
        let back = fft.inverse_real(&fft.forward_real(&plane));
        for (a, b) in plane.iter().zip(&back) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn test_dc_is_sum() {
        let fft = Fft2::new(4, 4);
        let spec = fft.forward_real(&[1.0; 16]);
        assert!((spec[0].re - 16.0).abs() < 1e-5);
        assert!(spec[1..].iter().all(|c| c.norm() < 1e-5));
    }

    #[test]
    fn test_impulse_is_flat() {
        let fft = Fft2::new(8, 8);
        let mut plane = vec![0.0f32; 64];
        plane[0] = 1.0;
        let spec = fft.forward_real(&plane);
        assert!(spec.iter().all(|c| (c.re - 1.0).abs() < 1e-6 && c.im.abs() < 1e-6));
    }

    #[test]
    fn test_parseval() {
        let fft = Fft2::new(8, 8);
        let plane: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();
        let spatial: f64 = plane.iter().map(|&v| (v * v) as f64).sum();
        let spec = Spectrum::from_plane(8, 8, fft.forward_real(&plane));
        assert!((spec.energy() / 64.0 - spatial).abs() < 1e-3);
    }

    #[test]
    fn test_blend() {
        let mut a = Spectrum::from_plane(1, 2, vec![Complex32::new(1.0, 0.0); 2]);
        let b = Spectrum::from_plane(1, 2, vec![Complex32::new(0.0, 2.0); 2]);
        a.blend(&b, 0.25);
        assert!((a.data[0].re - 0.75).abs() < 1e-6);
        assert!((a.data[0].im - 0.5).abs() < 1e-6);
    }
}
