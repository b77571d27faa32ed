// source.rs — Frames, frame sources and the sequence driver.
//
// The tracker only ever sees grayscale images. Frames may arrive gray or
// as interleaved color; `Frame::to_gray` converts on demand and borrows
// when no conversion is needed.
//
// A `FrameSource` is pulled one frame at a time. End of stream is either
// `Ok(None)` or an empty frame; an `Err` is a resource failure and stops
// the sequence immediately.

use std::borrow::Cow;
use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::convert::{to_gray, PixelLayout};
use crate::error::{Result, TrackError};
use crate::geometry::Rect;
use crate::image::Image;
use crate::tracker::Tracker;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One video frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Gray(Image<u8>),
    Color {
        width: usize,
        height: usize,
        layout: PixelLayout,
        data: Vec<u8>,
    },
}

impl Frame {
    pub fn width(&self) -> usize {
        match self {
            Frame::Gray(img) => img.width(),
            Frame::Color { width, .. } => *width,
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Frame::Gray(img) => img.height(),
            Frame::Color { height, .. } => *height,
        }
    }

    /// True for a zero-sized frame, the end-of-stream sentinel.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Grayscale view, converting color frames with BT.601 weights.
    pub fn to_gray(&self) -> Result<Cow<'_, Image<u8>>> {
        match self {
            Frame::Gray(img) => Ok(Cow::Borrowed(img)),
            Frame::Color { width, height, layout, data } => {
                Ok(Cow::Owned(to_gray(*width, *height, *layout, data)?))
            }
        }
    }
}

impl From<Image<u8>> for Frame {
    fn from(img: Image<u8>) -> Self {
        Frame::Gray(img)
    }
}

// ---------------------------------------------------------------------------
// FrameSource
// ---------------------------------------------------------------------------

/// Pull-based frame supply.
pub trait FrameSource {
    /// Next frame, `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// In-memory frame source.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    frames: VecDeque<Frame>,
}

impl VecSource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        VecSource { frames: frames.into_iter().collect() }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

// ---------------------------------------------------------------------------
// Sequence driver
// ---------------------------------------------------------------------------

/// Track through every frame of `source`.
///
/// The first frame initializes `tracker` with `initial`; each later frame
/// is stepped. `sink` receives `(frame_index, frame, rect)` for every frame,
/// including the initial one. A step that degenerates keeps the previous
/// box, which is emitted again. Returns the number of frames processed.
///
/// Stops at end of stream or an empty frame. Resource errors propagate.
pub fn run_sequence<S, F>(source: &mut S, tracker: &mut Tracker, initial: Rect, mut sink: F) -> Result<usize>
where
    S: FrameSource + ?Sized,
    F: FnMut(usize, &Frame, Rect),
{
    let first = match source.next_frame()? {
        Some(f) if !f.is_empty() => f,
        _ => {
            debug!("sequence ended before the first frame");
            return Ok(0);
        }
    };
    tracker.init(&first, initial)?;
    sink(0, &first, tracker.target().unwrap_or(initial));

    let mut index = 1;
    while let Some(frame) = source.next_frame()? {
        if frame.is_empty() {
            break;
        }
        let rect = match tracker.step(&frame) {
            Ok(rect) => rect,
            Err(TrackError::Degenerate(reason)) => {
                warn!(frame = index, %reason, "step degenerate, keeping previous box");
                tracker.target().ok_or(TrackError::NotInitialized)?
            }
            Err(e) => return Err(e),
        };
        sink(index, &frame, rect);
        index += 1;
    }
    debug!(frames = index, "sequence finished");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_borrows() {
        let f = Frame::from(Image::filled(4, 4, 9u8));
        assert!(matches!(f.to_gray().unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_color_converts() {
        let f = Frame::Color { width: 2, height: 1, layout: PixelLayout::Bgr, data: vec![255; 6] };
        let g = f.to_gray().unwrap();
        assert_eq!(g.as_slice(), &[255, 255]);
        assert_eq!((f.width(), f.height()), (2, 1));
    }

    #[test]
    fn test_empty_frame() {
        assert!(Frame::from(Image::<u8>::new(0, 0)).is_empty());
        assert!(!Frame::from(Image::<u8>::new(1, 1)).is_empty());
    }

    #[test]
    fn test_vec_source_drains_in_order() {
        let mut src = VecSource::new((1..=3).map(|v| Frame::from(Image::filled(2, 2, v as u8))));
        assert_eq!(src.remaining(), 3);
        let first = src.next_frame().unwrap().unwrap();
        assert_eq!(first.to_gray().unwrap().get(0, 0), 1);
        src.next_frame().unwrap();
        src.next_frame().unwrap();
        assert!(src.next_frame().unwrap().is_none());
    }
}
