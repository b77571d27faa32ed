// convert.rs — Color-to-gray and pixel-range conversions.
//
// Frames arrive from cameras and decoders as interleaved color buffers;
// every tracker stage works on single-channel intensity. This module owns
// that boundary:
//
//   interleaved RGB / BGR / RGBA / BGRA ──to_gray──▶ Image<u8>
//   Image<u8> ──u8_to_f32_centered──▶ Image<f32> in [-0.5, 0.5]
//
// Gray uses the ITU-R BT.601 luma weights (0.299, 0.587, 0.114) in 8-bit
// fixed point, matching what common imaging libraries produce.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::image::Image;

/// Channel order of an interleaved color buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelLayout {
    Rgb,
    Bgr,
    Rgba,
    Bgra,
}

impl PixelLayout {
    /// Bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb | PixelLayout::Bgr => 3,
            PixelLayout::Rgba | PixelLayout::Bgra => 4,
        }
    }

    /// Byte offsets of (red, green, blue) within one pixel.
    fn rgb_offsets(self) -> (usize, usize, usize) {
        match self {
            PixelLayout::Rgb | PixelLayout::Rgba => (0, 1, 2),
            PixelLayout::Bgr | PixelLayout::Bgra => (2, 1, 0),
        }
    }
}

/// Convert an interleaved color buffer to an 8-bit gray image.
///
/// Returns `TrackError::Resource` if `data` does not hold exactly
/// `width * height * layout.channels()` bytes.
pub fn to_gray(width: usize, height: usize, layout: PixelLayout, data: &[u8]) -> Result<Image<u8>> {
    let cn = layout.channels();
    let expected = width * height * cn;
    if data.len() != expected {
        return Err(TrackError::Resource(format!(
            "{layout:?} buffer holds {} bytes, expected {expected} for {width}x{height}",
            data.len()
        )));
    }

    let (r, g, b) = layout.rgb_offsets();
    let gray: Vec<u8> = data
        .chunks_exact(cn)
        .map(|px| luma(px[r], px[g], px[b]))
        .collect();
    Ok(Image::from_vec(width, height, gray))
}

/// BT.601 luma in Q8 fixed point (77 + 150 + 29 = 256).
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

/// Map 8-bit intensity to a zero-centered float: `v / 255 - 0.5`.
///
/// This is the raw-pixel feature used when a channel is configured
/// without HOG.
pub fn u8_to_f32_centered(src: &Image<u8>) -> Image<f32> {
    src.map(|v| v as f32 / 255.0 - 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_primaries() {
        let data = [255, 0, 0, 0, 255, 0, 0, 0, 255];
        let gray = to_gray(3, 1, PixelLayout::Rgb, &data).unwrap();
        assert_eq!(gray.get(0, 0), 77);
        // 150 * 255 falls just short of the next Q8 step.
        assert_eq!(gray.get(1, 0), 149);
        assert_eq!(gray.get(2, 0), 29);
    }

    #[test]
    fn test_bgr_swaps_channels() {
        let rgb = to_gray(1, 1, PixelLayout::Rgb, &[255, 0, 0]).unwrap();
        let bgr = to_gray(1, 1, PixelLayout::Bgr, &[0, 0, 255]).unwrap();
        assert_eq!(rgb.get(0, 0), bgr.get(0, 0));
    }

    #[test]
    fn test_white_stays_white() {
        let gray = to_gray(2, 1, PixelLayout::Rgba, &[255; 8]).unwrap();
        assert_eq!(gray.as_slice(), &[255, 255]);
    }

    #[test]
    fn test_wrong_buffer_length() {
        let err = to_gray(2, 2, PixelLayout::Rgb, &[0; 11]).unwrap_err();
        assert!(matches!(err, TrackError::Resource(_)));
    }

    #[test]
    fn test_centered_range() {
        let img = Image::from_vec(2, 1, vec![0u8, 255]);
        let f = u8_to_f32_centered(&img);
        assert!((f.get(0, 0) + 0.5).abs() < 1e-6);
        assert!((f.get(1, 0) - 0.5).abs() < 1e-6);
    }
}
