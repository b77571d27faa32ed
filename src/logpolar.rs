// logpolar.rs — Precomputed Cartesian → log-polar resampling.
//
// A scale change of the target around its center becomes a shift along
// the log-radius axis after this transform, which lets the scale channel
// reuse the translation filter machinery unchanged.
//
// The grid is built once for a fixed source size:
//
//   center  = (w/2, h/2)
//   ρ_max   = half the source diagonal,  ρ_min = ρ_max · ratio
//   ρ_i     = exp(ln ρ_min + i · (ln ρ_max − ln ρ_min)/(nρ − 1))
//   θ_j     = −π + j · 2π/nθ
//   (x, y)  = center + ρ_i · (cos θ_j, sin θ_j)       stored as Q16.16
//
// Output column i is ρ_i, output row j is θ_j. Resampling decodes each
// fixed-point coordinate into an integer pixel plus 8-bit fractional
// weights and blends with integer arithmetic only:
//
//   interior         4 taps, weights (256−u)(256−v), u(256−v), (256−u)v, uv
//   last column      2 taps, vertical blend only
//   last row         2 taps, horizontal blend only
//   last pixel       1 tap
//
// Every sub-case's weights sum to 65536, so a constant image maps to the
// same constant. Coordinates outside the source yield 0 (`BorderMode::Zero`)
// or are clamped to the nearest edge pixel (`BorderMode::Replicate`).

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::image::Image;

const RHO_EPSILON: f64 = 1.192_092_9e-7;

/// Fixed-point scale for grid coordinates (Q16.16).
const FIXED_ONE: f64 = 65536.0;

/// What an out-of-range sample produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderMode {
    /// Samples outside the source are 0.
    Zero,
    /// Samples outside the source take the nearest edge pixel.
    #[default]
    Replicate,
}

/// Immutable resampling map for one source size.
#[derive(Debug, Clone, PartialEq)]
pub struct LogPolarGrid {
    src_width: usize,
    src_height: usize,
    rho: usize,
    theta: usize,
    min_radius_ratio: f32,
    border: BorderMode,
    /// Q16.16 source x for each (theta, rho), row-major by theta.
    xs: Vec<i32>,
    ys: Vec<i32>,
}

impl LogPolarGrid {
    /// Build a grid mapping a `src_width × src_height` image onto
    /// `rho` radial by `theta` angular samples.
    ///
    /// Returns `TrackError::Config` unless `0 ≤ min_radius_ratio < 1`,
    /// `rho ≥ 2`, `theta ≥ 1` and the source is non-empty.
    pub fn new(
        src_width: usize,
        src_height: usize,
        rho: usize,
        theta: usize,
        min_radius_ratio: f32,
    ) -> Result<Self> {
        if !(0.0..1.0).contains(&min_radius_ratio) {
            return Err(TrackError::Config(format!(
                "minimum radius ratio {min_radius_ratio} outside [0, 1)"
            )));
        }
        if rho < 2 || theta < 1 {
            return Err(TrackError::Config(format!(
                "log-polar grid needs at least 2 radial and 1 angular samples, got {rho}×{theta}"
            )));
        }
        if src_width == 0 || src_height == 0 {
            return Err(TrackError::Config("log-polar source must be non-empty".into()));
        }

        let (w, h) = (src_width as f64, src_height as f64);
        let (cx, cy) = (w * 0.5, h * 0.5);
        let rho_max = (w * w + h * h).sqrt() * 0.5;
        let rho_min = rho_max * min_radius_ratio as f64;
        let log_max = (rho_max + RHO_EPSILON).ln();
        let log_min = (rho_min + RHO_EPSILON).ln();
        let inc = (log_max - log_min) / (rho - 1) as f64;

        let radii: Vec<f64> = (0..rho).map(|i| (log_min + inc * i as f64).exp()).collect();

        let mut xs = Vec::with_capacity(rho * theta);
        let mut ys = Vec::with_capacity(rho * theta);
        for j in 0..theta {
            let t = -PI + 2.0 * PI * j as f64 / theta as f64;
            let (sin_t, cos_t) = t.sin_cos();
            for &r in &radii {
                // Truncation toward zero, as a plain integer cast does.
                xs.push(((cos_t * r + cx) * FIXED_ONE) as i32);
                ys.push(((sin_t * r + cy) * FIXED_ONE) as i32);
            }
        }

        Ok(LogPolarGrid {
            src_width,
            src_height,
            rho,
            theta,
            min_radius_ratio,
            border: BorderMode::default(),
            xs,
            ys,
        })
    }

    /// Same grid with a different out-of-range policy.
    pub fn with_border(mut self, border: BorderMode) -> Self {
        self.border = border;
        self
    }

    pub fn border(&self) -> BorderMode {
        self.border
    }

    /// Output width: number of radial samples.
    pub fn rho_samples(&self) -> usize {
        self.rho
    }

    /// Output height: number of angular samples.
    pub fn theta_samples(&self) -> usize {
        self.theta
    }

    pub fn min_radius_ratio(&self) -> f32 {
        self.min_radius_ratio
    }

    pub fn source_size(&self) -> (usize, usize) {
        (self.src_width, self.src_height)
    }

    /// Resample `src` into a new `rho × theta` image.
    pub fn apply(&self, src: &Image<u8>) -> Image<u8> {
        let mut dst = Image::new(self.rho, self.theta);
        self.apply_into(src, &mut dst);
        dst
    }

    /// Resample into an existing `rho × theta` image.
    ///
    /// # Panics
    /// Panics if `src` or `dst` does not have the size the grid was built for.
    pub fn apply_into(&self, src: &Image<u8>, dst: &mut Image<u8>) {
        assert!(
            src.width() == self.src_width && src.height() == self.src_height,
            "source is {}×{}, grid built for {}×{}",
            src.width(),
            src.height(),
            self.src_width,
            self.src_height,
        );
        assert!(
            dst.width() == self.rho && dst.height() == self.theta,
            "destination is {}×{}, grid produces {}×{}",
            dst.width(),
            dst.height(),
            self.rho,
            self.theta,
        );

        let ws = self.src_width as i32;
        let hs = self.src_height as i32;
        let pixels = src.as_slice();
        let at = |x: i32, y: i32| pixels[(y * ws + x) as usize] as u32;

        for (k, out) in dst.as_mut_slice().iter_mut().enumerate() {
            let (px, py) = (self.xs[k], self.ys[k]);
            let mut x = px >> 16;
            let mut y = py >> 16;
            let mut u = ((px & 0xFFFF) >> 8) as u32;
            let mut v = ((py & 0xFFFF) >> 8) as u32;

            let outside = x < 0 || y < 0 || x >= ws || y >= hs;
            if outside {
                match self.border {
                    BorderMode::Zero => {
                        *out = 0;
                        continue;
                    }
                    BorderMode::Replicate => {
                        if x < 0 || x >= ws {
                            x = x.clamp(0, ws - 1);
                            u = 0;
                        }
                        if y < 0 || y >= hs {
                            y = y.clamp(0, hs - 1);
                            v = 0;
                        }
                    }
                }
            }

            let last_col = x == ws - 1;
            let last_row = y == hs - 1;
            let p = match (last_col, last_row) {
                (true, true) => at(x, y) << 16,
                (true, false) => {
                    let s1 = v << 8;
                    let s0 = 65536 - s1;
                    at(x, y) * s0 + at(x, y + 1) * s1
                }
                (false, true) => {
                    let s2 = u << 8;
                    let s0 = 65536 - s2;
                    at(x, y) * s0 + at(x + 1, y) * s2
                }
                (false, false) => {
                    let s3 = u * v;
                    let s2 = (u << 8) - s3;
                    let s1 = (v << 8) - s3;
                    let s0 = 65536 - s1 - s2 - s3;
                    at(x, y) * s0 + at(x, y + 1) * s1 + at(x + 1, y) * s2 + at(x + 1, y + 1) * s3
                }
            };
            *out = (p >> 16).min(255) as u8;
        }
    }
}
