// tracker.rs — Single-target tracker: translation filter plus optional
// log-polar scale filter.
//
// Per session (`init`):
//   target box from the initial rect, search window = target · (1 + padding)
//   translation: window patch → resize to P·C → features → train
//   scale:       target patch → resize → log-polar → features → train
//
// Per frame (`step`):
//   1. Detect in the current window. The peak (in cells) maps back to
//      pixels through zoom = (window − 1)/(P − 1) from the window's top-left
//      corner; this is the new center.
//   2. If scale is enabled, detect on the log-polar patch at the new
//      center. A peak offset δ along the radius axis means a size ratio of
//      exp(−ln(min_radius_ratio) · δ / P); the target is resized and the
//      window recomputed from it.
//   3. Resample both patches at the updated box, train fresh models and
//      fold them into the running models with each channel's learn rate.
//
// Everything in `step` is computed into locals and committed at the end,
// so a failing step leaves the session exactly as it was.
//
// NEW RUST CONCEPTS:
// - `Option<Session>` as an explicit "not yet initialized" state instead
//   of half-built fields.
// - Borrowing disjoint struct fields (`self.translation` mutably while
//   `self.session` is read).

use tracing::{debug, trace, warn};

use crate::config::TrackerConfig;
use crate::error::{Result, TrackError};
use crate::features::{gaussian_label, FeatureExtractor, FeatureKind};
use crate::fft::Spectrum;
use crate::filter::{CorrelationFilter, FilterModel, Peak};
use crate::geometry::{CenterBox, Rect};
use crate::image::{extract_patch, resize_bilinear, Image};
use crate::logpolar::LogPolarGrid;
use crate::source::Frame;

/// Where the tracker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No target yet; `step` fails with `NotInitialized`.
    Uninitialized,
    /// Initialized on a frame, no step taken yet.
    Ready,
    /// At least one frame tracked.
    Located,
}

/// Feature extraction plus filter engine for one channel.
#[derive(Debug, Clone)]
struct Engine {
    extractor: FeatureExtractor,
    filter: CorrelationFilter,
    learn_rate: f32,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    fn new(
        kind: FeatureKind,
        pattern_size: usize,
        cell_size: usize,
        sigma_rate: f32,
        learn_rate: f32,
        kernel_sigma: f32,
        lambda: f32,
    ) -> Result<Self> {
        let extractor = FeatureExtractor::new(kind, pattern_size, cell_size)?;
        let label = gaussian_label(pattern_size, pattern_size as f32 / sigma_rate);
        Ok(Engine {
            extractor,
            filter: CorrelationFilter::new(&label, kernel_sigma, lambda),
            learn_rate,
        })
    }

    fn pattern_size(&self) -> usize {
        self.extractor.pattern_size()
    }

    /// Features and spectrum of a patch already at `patch_size`.
    fn spectrum(&mut self, patch: &Image<u8>) -> Result<Spectrum> {
        let map = self.extractor.extract(patch)?;
        Ok(self.filter.fft().forward_map(&map))
    }

    /// Crop `region`, normalize it to the extractor's patch size.
    fn normalized_patch(&self, gray: &Image<u8>, region: &CenterBox) -> Image<u8> {
        let n = self.extractor.patch_size();
        resize_bilinear(&extract_patch(gray, region), n, n)
    }
}

/// Scale channel: engine plus the log-polar grid for its patch size.
#[derive(Debug, Clone)]
struct ScaleEngine {
    engine: Engine,
    grid: LogPolarGrid,
    padding: f64,
    min_radius_ratio: f32,
}

impl ScaleEngine {
    fn spectrum(&mut self, gray: &Image<u8>, target: &CenterBox) -> Result<Spectrum> {
        let region = target.padded(self.padding);
        let patch = self.engine.normalized_patch(gray, &region);
        let polar = self.grid.apply(&patch);
        self.engine.spectrum(&polar)
    }

    fn train_at(&mut self, gray: &Image<u8>, target: &CenterBox) -> Result<FilterModel> {
        let x = self.spectrum(gray, target)?;
        Ok(self.engine.filter.train(x))
    }

    /// Size ratio implied by a peak at column `peak_x` of the response.
    fn ratio(&self, peak_x: f32) -> f64 {
        let p = self.engine.pattern_size() as f64;
        let offset = peak_x as f64 - (p - 1.0) * 0.5;
        (-(self.min_radius_ratio as f64).ln() * offset / p).exp()
    }
}

/// Per-session state created by `init`.
#[derive(Debug, Clone)]
struct Session {
    target: CenterBox,
    window: CenterBox,
    translation: FilterModel,
    scale: Option<FilterModel>,
    frames: u64,
}

/// Kernelized correlation filter tracker for one target.
#[derive(Debug, Clone)]
pub struct Tracker {
    config: TrackerConfig,
    translation: Engine,
    scale: Option<ScaleEngine>,
    session: Option<Session>,
}

impl Tracker {
    /// Build a tracker. All configuration errors surface here.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;

        let t = &config.translation;
        let translation = Engine::new(
            t.features,
            t.pattern_size,
            t.cell_size,
            t.sigma_rate,
            t.learn_rate,
            config.kernel_sigma,
            config.lambda,
        )?;

        let scale = if config.scale.enabled {
            let s = &config.scale;
            let engine = Engine::new(
                s.features,
                s.pattern_size,
                s.cell_size,
                s.sigma_rate,
                s.learn_rate,
                config.kernel_sigma,
                config.lambda,
            )?;
            let n = engine.extractor.patch_size();
            let grid = LogPolarGrid::new(n, n, n, n, s.min_radius_ratio)?.with_border(s.border);
            Some(ScaleEngine {
                engine,
                grid,
                padding: s.padding,
                min_radius_ratio: s.min_radius_ratio,
            })
        } else {
            None
        };

        Ok(Tracker { config, translation, scale, session: None })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> TrackerState {
        match &self.session {
            None => TrackerState::Uninitialized,
            Some(s) if s.frames == 0 => TrackerState::Ready,
            Some(_) => TrackerState::Located,
        }
    }

    /// Current target as a corner rectangle.
    pub fn target(&self) -> Option<Rect> {
        self.session.as_ref().map(|s| s.target.to_rect())
    }

    /// Current target as an integer center box.
    pub fn target_box(&self) -> Option<CenterBox> {
        self.session.as_ref().map(|s| s.target)
    }

    /// Current search window.
    pub fn window_box(&self) -> Option<CenterBox> {
        self.session.as_ref().map(|s| s.window)
    }

    /// Frames stepped since the last `init`.
    pub fn frames_tracked(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.frames)
    }

    /// Start (or restart) tracking `initial` on `frame`.
    pub fn init(&mut self, frame: &Frame, initial: Rect) -> Result<()> {
        if frame.is_empty() {
            return Err(TrackError::EmptyFrame);
        }
        if !initial.is_valid() {
            return Err(TrackError::Config(format!(
                "initial box {}x{} must be at least 1x1",
                initial.width, initial.height
            )));
        }
        let gray = frame.to_gray()?;

        let target = clamp_into(&CenterBox::from_rect(&initial), &gray);
        let window = target.padded(self.config.translation.padding);

        let patch = self.translation.normalized_patch(&gray, &window);
        let x = self.translation.spectrum(&patch)?;
        let translation = self.translation.filter.train(x);
        let scale = self.scale.as_mut().map(|s| s.train_at(&gray, &target)).transpose()?;

        debug!(
            cx = target.cx,
            cy = target.cy,
            width = target.width,
            height = target.height,
            window_w = window.width,
            window_h = window.height,
            pattern = self.translation.pattern_size(),
            scale = self.scale.is_some(),
            "tracker initialized"
        );

        self.session = Some(Session { target, window, translation, scale, frames: 0 });
        Ok(())
    }

    /// Track the target into `frame` and return its new rectangle.
    ///
    /// On error the session is left untouched.
    pub fn step(&mut self, frame: &Frame) -> Result<Rect> {
        let session = self.session.as_ref().ok_or(TrackError::NotInitialized)?;
        if frame.is_empty() {
            return Err(TrackError::EmptyFrame);
        }
        let gray = frame.to_gray()?;

        // 1. Translation.
        let z = {
            let patch = self.translation.normalized_patch(&gray, &session.window);
            self.translation.spectrum(&patch)?
        };
        let det = self.translation.filter.detect(&z, &session.translation);
        let (cx, cy) = window_to_frame(&session.window, &det.peak, self.translation.pattern_size())?;
        trace!(peak_x = det.peak.x, peak_y = det.peak.y, cx, cy, "translation peak");

        let moved = CenterBox { cx, cy, ..session.target };
        let mut target = clamp_into(&moved, &gray);
        let mut window = CenterBox { cx: target.cx, cy: target.cy, ..session.window };

        // 2. Scale.
        if let (Some(s), Some(model)) = (&mut self.scale, &session.scale) {
            let z = s.spectrum(&gray, &target)?;
            let det = s.engine.filter.detect(&z, model);
            let ratio = s.ratio(det.peak.x);
            trace!(peak_x = det.peak.x, ratio, "scale peak");

            match rescaled(&target, ratio) {
                Some(resized) => {
                    target = resized;
                    window = target.padded_rounded(self.config.translation.padding);
                }
                None => warn!(ratio, width = target.width, height = target.height, "rejected degenerate scale update"),
            }
        }

        // 3. Fresh models at the updated box.
        let fresh_t = {
            let patch = self.translation.normalized_patch(&gray, &window);
            let x = self.translation.spectrum(&patch)?;
            self.translation.filter.train(x)
        };
        let fresh_s = self.scale.as_mut().map(|s| s.train_at(&gray, &target)).transpose()?;

        // Commit.
        let t_rate = self.translation.learn_rate;
        let s_rate = self.scale.as_ref().map_or(0.0, |s| s.engine.learn_rate);
        let session = self.session.as_mut().ok_or(TrackError::NotInitialized)?;
        session.translation.blend(&fresh_t, t_rate);
        if let (Some(model), Some(fresh)) = (session.scale.as_mut(), fresh_s.as_ref()) {
            model.blend(fresh, s_rate);
        }
        session.target = target;
        session.window = window;
        session.frames += 1;

        Ok(target.to_rect())
    }
}

/// Map a response peak inside `window` back to the center pixel in frame
/// coordinates.
///
/// `peak · zoom + left` is the geometric center of the located box. On an
/// even window that lies half a pixel right of the center pixel, so the
/// half is removed before rounding; flooring instead would pull an odd
/// window one pixel left whenever the refined peak sits just below center.
fn window_to_frame(window: &CenterBox, peak: &Peak, pattern: usize) -> Result<(i32, i32)> {
    let denom = (pattern - 1) as f64;
    let zoom_x = (window.width - 1) as f64 / denom;
    let zoom_y = (window.height - 1) as f64 / denom;
    let corners = window.corners();
    let x = (peak.x as f64 * zoom_x + corners.left as f64 - even_shift(window.width)).round();
    let y = (peak.y as f64 * zoom_y + corners.top as f64 - even_shift(window.height)).round();
    if !x.is_finite() || !y.is_finite() {
        return Err(TrackError::Degenerate(format!("non-finite peak ({}, {})", peak.x, peak.y)));
    }
    Ok((x as i32, y as i32))
}

#[inline]
fn even_shift(side: i32) -> f64 {
    if side % 2 == 0 { 0.5 } else { 0.0 }
}

/// Resize `target` by `ratio`, or `None` if the result would be empty,
/// overflow or is not a number.
fn rescaled(target: &CenterBox, ratio: f64) -> Option<CenterBox> {
    let w = (target.width as f64 * ratio).round();
    let h = (target.height as f64 * ratio).round();
    let valid = |v: f64| v.is_finite() && v >= 1.0 && v <= i32::MAX as f64;
    (ratio.is_finite() && valid(w) && valid(h)).then(|| target.with_size(w as i32, h as i32))
}

/// Keep the box center inside the frame.
fn clamp_into(b: &CenterBox, gray: &Image<u8>) -> CenterBox {
    let clamped = b.clamp_center(gray.width() as i32, gray.height() as i32);
    if clamped != *b {
        warn!(cx = b.cx, cy = b.cy, "target center left the frame, clamped");
    }
    clamped
}
