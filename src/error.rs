// error.rs — Crate-wide error type.
//
// Four families of failure, each with a different recovery story:
//
//   Config: rejected before tracking starts (bad sizes, bad ranges).
//   Resource: the frame source cannot deliver; surfaced immediately.
//   Data: ground-truth annotations are missing or malformed.
//   Degenerate: a step could not produce a valid box; tracker state is
//               left exactly as it was before the step.

use thiserror::Error;

/// Errors produced by the tracker and its building blocks.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Invalid configuration or descriptor parameters.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Image handed to a feature extractor is too small to have interior pixels.
    #[error("image {width}x{height} is too small (both sides must exceed 3 pixels)")]
    ImageTooSmall { width: usize, height: usize },

    /// An empty frame was handed to the tracker.
    #[error("empty frame")]
    EmptyFrame,

    /// The frame source failed to deliver a frame.
    #[error("frame source error: {0}")]
    Resource(String),

    /// Malformed or missing annotation data.
    #[error("data error: {0}")]
    Data(String),

    /// A step could not produce a valid box; previous state retained.
    #[error("degenerate tracking state: {0}")]
    Degenerate(String),

    /// `step` was called before `init`.
    #[error("tracker has not been initialized")]
    NotInitialized,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackError>;
