// config.rs — Tracker configuration and validation.
//
// Plain structs with public fields and `Default`, so callers can start
// from the defaults and override a field or two. Serde support lets the
// demos load partial JSON files: missing fields fall back to defaults.
//
// Sizes are in HOG cells. A channel with pattern size P and cell size C
// resamples its patch to P·C pixels square and produces a P×P feature
// plane; P must be a power of two.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::features::FeatureKind;
use crate::logpolar::BorderMode;

/// Translation channel parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Search window = target size × (1 + padding). Range [0.5, 2.0].
    pub padding: f64,
    /// Feature plane side, in cells. Power of two in [16, 128].
    pub pattern_size: usize,
    /// HOG cell side in pixels. Range [2, 8].
    pub cell_size: usize,
    /// Label sigma = pattern_size / sigma_rate. Range [8, 128].
    pub sigma_rate: f32,
    /// EMA rate for model updates. Range [0.001, 1.0].
    pub learn_rate: f32,
    pub features: FeatureKind,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        TranslationConfig {
            padding: 1.5,
            pattern_size: 32,
            cell_size: 4,
            sigma_rate: 26.0,
            learn_rate: 0.02,
            features: FeatureKind::HogWindowed,
        }
    }
}

/// Scale channel parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub enabled: bool,
    /// Padding around the target before log-polar resampling. Range [0, 2.0].
    pub padding: f64,
    /// Feature plane side, in cells. Power of two in [16, 128].
    pub pattern_size: usize,
    /// HOG cell side in pixels. Range [2, 8].
    pub cell_size: usize,
    /// Range [8, 128].
    pub sigma_rate: f32,
    /// Range [0.001, 1.0].
    pub learn_rate: f32,
    /// Innermost log-polar radius as a fraction of the outermost. Range [0.01, 1.0).
    pub min_radius_ratio: f32,
    pub features: FeatureKind,
    pub border: BorderMode,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        ScaleConfig {
            enabled: false,
            padding: 0.0,
            pattern_size: 32,
            cell_size: 4,
            sigma_rate: 24.0,
            learn_rate: 0.02,
            min_radius_ratio: 0.2,
            features: FeatureKind::HogWindowed,
            border: BorderMode::Replicate,
        }
    }
}

/// Complete tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Ridge regression regularizer, shared by both channels.
    pub lambda: f32,
    /// Gaussian kernel bandwidth, shared by both channels.
    pub kernel_sigma: f32,
    pub translation: TranslationConfig,
    pub scale: ScaleConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            lambda: 1e-4,
            kernel_sigma: 0.5,
            translation: TranslationConfig::default(),
            scale: ScaleConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Defaults with the scale channel switched on.
    pub fn with_scale() -> Self {
        let mut cfg = TrackerConfig::default();
        cfg.scale.enabled = true;
        cfg
    }

    /// Check every option against its documented range.
    ///
    /// Scale parameters are only checked when the scale channel is enabled.
    pub fn validate(&self) -> Result<()> {
        positive("lambda", self.lambda)?;
        positive("kernel_sigma", self.kernel_sigma)?;

        let t = &self.translation;
        in_range("translation.padding", t.padding, 0.5, 2.0)?;
        pattern("translation.pattern_size", t.pattern_size)?;
        in_range("translation.cell_size", t.cell_size as f64, 2.0, 8.0)?;
        in_range("translation.sigma_rate", t.sigma_rate as f64, 8.0, 128.0)?;
        in_range("translation.learn_rate", t.learn_rate as f64, 0.001, 1.0)?;

        let s = &self.scale;
        if s.enabled {
            in_range("scale.padding", s.padding, 0.0, 2.0)?;
            pattern("scale.pattern_size", s.pattern_size)?;
            in_range("scale.cell_size", s.cell_size as f64, 2.0, 8.0)?;
            in_range("scale.sigma_rate", s.sigma_rate as f64, 8.0, 128.0)?;
            in_range("scale.learn_rate", s.learn_rate as f64, 0.001, 1.0)?;
            let r = s.min_radius_ratio;
            if !(0.01..1.0).contains(&r) {
                return Err(TrackError::Config(format!(
                    "scale.min_radius_ratio = {r} outside [0.01, 1.0)"
                )));
            }
        }
        Ok(())
    }
}

fn in_range(name: &str, v: f64, lo: f64, hi: f64) -> Result<()> {
    if (lo..=hi).contains(&v) {
        Ok(())
    } else {
        Err(TrackError::Config(format!("{name} = {v} outside [{lo}, {hi}]")))
    }
}

fn positive(name: &str, v: f32) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(TrackError::Config(format!("{name} = {v} must be positive")))
    }
}

fn pattern(name: &str, v: usize) -> Result<()> {
    in_range(name, v as f64, 16.0, 128.0)?;
    if !v.is_power_of_two() {
        return Err(TrackError::Config(format!("{name} = {v} is not a power of two")));
    }
    Ok(())
}
