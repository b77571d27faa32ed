// lpkcf: Log-Polar Kernelized Correlation Filter tracker
// Single-target visual tracking with HOG features, FFT-domain ridge
// regression and log-polar scale estimation.
//
// Reference: Henriques, Caseiro, Martins, Batista, "High-Speed Tracking
// with Kernelized Correlation Filters" (TPAMI 2015)

pub mod error;
pub mod image;
pub mod convert;
pub mod geometry;
pub mod hog;
pub mod logpolar;
pub mod fft;
pub mod features;
pub mod filter;
pub mod config;
pub mod tracker;
pub mod source;
pub mod dataset;
pub mod selection;

pub use config::{ScaleConfig, TrackerConfig, TranslationConfig};
pub use error::{Result, TrackError};
pub use geometry::{CenterBox, Rect};
pub use image::Image;
pub use source::{run_sequence, Frame, FrameSource, VecSource};
pub use tracker::{Tracker, TrackerState};
