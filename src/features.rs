// features.rs — Feature maps, extraction variants and per-session templates.
//
// A feature map is either a single 2D plane (raw intensity) or a stack of
// equally sized planes (HOG). The shape travels with the value, so nothing
// downstream has to guess the rank from sentinel dimensions.
//
// Extraction paths:
//
//   Raw          v/255 - 0.5, times the Hann window     [rows, cols]
//   Hog          HOG channels, unwindowed               [dim, rows, cols]
//   HogWindowed  HOG channels, each times the window    [dim, rows, cols]
//
// The Hann window and Gaussian regression label are computed once per
// session from the pattern size and never change afterwards.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::convert::u8_to_f32_centered;
use crate::error::{Result, TrackError};
use crate::hog::{HogBuffers, HogDescriptor};
use crate::image::Image;

/// Number of HOG orientations used by the tracker's extractors.
pub const HOG_ORIENTATIONS: usize = 9;

// ---------------------------------------------------------------------------
// FeatureKind
// ---------------------------------------------------------------------------

/// Which extraction path a tracking channel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Raw,
    Hog,
    HogWindowed,
}

impl Default for FeatureKind {
    fn default() -> Self {
        FeatureKind::HogWindowed
    }
}

// ---------------------------------------------------------------------------
// FeatureMap
// ---------------------------------------------------------------------------

/// A feature tensor with an explicit shape.
///
/// `Multi` stores channels back to back, each plane row-major:
/// element (k, row, col) lives at `k·rows·cols + row·cols + col`.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureMap {
    Single(Image<f32>),
    Multi {
        channels: usize,
        rows: usize,
        cols: usize,
        data: Vec<f32>,
    },
}

impl FeatureMap {
    pub fn channels(&self) -> usize {
        match self {
            FeatureMap::Single(_) => 1,
            FeatureMap::Multi { channels, .. } => *channels,
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            FeatureMap::Single(img) => img.height(),
            FeatureMap::Multi { rows, .. } => *rows,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            FeatureMap::Single(img) => img.width(),
            FeatureMap::Multi { cols, .. } => *cols,
        }
    }

    /// Total element count, `channels · rows · cols`.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All elements, channel-major.
    pub fn as_slice(&self) -> &[f32] {
        match self {
            FeatureMap::Single(img) => img.as_slice(),
            FeatureMap::Multi { data, .. } => data,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [f32] {
        match self {
            FeatureMap::Single(img) => img.as_mut_slice(),
            FeatureMap::Multi { data, .. } => data,
        }
    }

    /// One channel plane, row-major.
    ///
    /// # Panics
    /// Panics if `k >= channels()`.
    pub fn channel(&self, k: usize) -> &[f32] {
        assert!(k < self.channels(), "channel {k} out of range ({})", self.channels());
        let plane = self.rows() * self.cols();
        &self.as_slice()[k * plane..(k + 1) * plane]
    }

    /// Element at (channel, row, col).
    #[inline]
    pub fn at(&self, k: usize, row: usize, col: usize) -> f32 {
        let (rows, cols) = (self.rows(), self.cols());
        assert!(row < rows && col < cols, "({row},{col}) out of range for {rows}×{cols}");
        self.channel(k)[row * cols + col]
    }

    /// Multiply every channel elementwise by `window`.
    ///
    /// # Panics
    /// Panics if the window shape differs from the spatial shape.
    pub fn apply_window(&mut self, window: &Image<f32>) {
        assert!(
            window.width() == self.cols() && window.height() == self.rows(),
            "window {}×{} does not match feature plane {}×{}",
            window.width(),
            window.height(),
            self.cols(),
            self.rows(),
        );
        let w = window.as_slice();
        for plane in self.as_mut_slice().chunks_exact_mut(w.len()) {
            for (v, &h) in plane.iter_mut().zip(w) {
                *v *= h;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Separable raised-cosine window, sampled at pixel centers.
///
/// `w(i, j) = 0.25 · (1 − cos(2π(i+0.5)/n)) · (1 − cos(2π(j+0.5)/n))`,
/// peaking at 1 in the middle and falling to near 0 at the border.
pub fn hann_window(n: usize) -> Image<f32> {
    let axis: Vec<f32> = (0..n)
        .map(|i| 1.0 - (2.0 * PI * (i as f32 + 0.5) / n as f32).cos())
        .collect();
    Image::from_fn(n, n, |x, y| 0.25 * axis[x] * axis[y])
}

/// Regression target: an isotropic Gaussian centered on the patch.
///
/// The peak sits between the two middle pixels, at `(n − 1) / 2`.
pub fn gaussian_label(n: usize, sigma: f32) -> Image<f32> {
    let half = n as f32 * 0.5;
    let scale = -0.5 / (sigma * sigma);
    Image::from_fn(n, n, |x, y| {
        let dx = x as f32 + 0.5 - half;
        let dy = y as f32 + 0.5 - half;
        (scale * (dx * dx + dy * dy)).exp()
    })
}

// ---------------------------------------------------------------------------
// FeatureExtractor
// ---------------------------------------------------------------------------

/// Turns a normalized grayscale patch into a windowed feature map.
///
/// Owns the HOG descriptor, its scratch buffers and the Hann window, so
/// repeated extraction does not rebuild any tables.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    kind: FeatureKind,
    pattern_size: usize,
    patch_size: usize,
    hog: Option<HogDescriptor>,
    buffers: HogBuffers,
    window: Image<f32>,
}

impl FeatureExtractor {
    /// Build an extractor for a `pattern_size × pattern_size` feature plane.
    ///
    /// For the HOG paths the input patch is `pattern_size · cell_size`
    /// pixels square; for `Raw` it is `pattern_size` pixels square.
    pub fn new(kind: FeatureKind, pattern_size: usize, cell_size: usize) -> Result<Self> {
        if pattern_size == 0 {
            return Err(TrackError::Config("pattern size must be positive".into()));
        }
        let (hog, patch_size) = match kind {
            FeatureKind::Raw => (None, pattern_size),
            FeatureKind::Hog | FeatureKind::HogWindowed => {
                let hog = HogDescriptor::new(cell_size, HOG_ORIENTATIONS, false, false)?;
                let patch = pattern_size * cell_size;
                if hog.feature_cols(patch) != pattern_size {
                    return Err(TrackError::Config(format!(
                        "{patch}px patch does not map onto {pattern_size} cells"
                    )));
                }
                (Some(hog), patch)
            }
        };

        Ok(FeatureExtractor {
            kind,
            pattern_size,
            patch_size,
            hog,
            buffers: HogBuffers::default(),
            window: hann_window(pattern_size),
        })
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    /// Side length of the feature plane.
    pub fn pattern_size(&self) -> usize {
        self.pattern_size
    }

    /// Side length of the pixel patch `extract` expects.
    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// Number of channels in every extracted map.
    pub fn channels(&self) -> usize {
        self.hog.as_ref().map_or(1, HogDescriptor::channels)
    }

    pub fn window(&self) -> &Image<f32> {
        &self.window
    }

    /// Extract features from a `patch_size × patch_size` patch.
    ///
    /// # Panics
    /// Panics if the patch has the wrong size.
    pub fn extract(&mut self, patch: &Image<u8>) -> Result<FeatureMap> {
        assert!(
            patch.width() == self.patch_size && patch.height() == self.patch_size,
            "patch is {}×{}, extractor expects {}×{}",
            patch.width(),
            patch.height(),
            self.patch_size,
            self.patch_size,
        );

        let mut map = match &self.hog {
            None => FeatureMap::Single(u8_to_f32_centered(patch)),
            Some(hog) => hog.compute_with(patch, &mut self.buffers)?,
        };
        if self.kind != FeatureKind::Hog {
            map.apply_window(&self.window);
        }
        Ok(map)
    }
}
