// image.rs — Owned grayscale image container and patch sampling.
//
// Every stage of the tracker moves pixels between a handful of fixed-size
// buffers: the frame, the padded search window cropped out of it, the
// window resized to the pattern size, and the log-polar resampling of the
// target. `Image<T>` is the one container used for all of them.
//
//   frame (any size) ──extract_patch──▶ window (box size, edge-replicated)
//                    ──resize_bilinear─▶ patch (pattern_size × cell_size)
//
// NEW RUST CONCEPTS:
// - A trait (`Pixel`) with associated conversion functions, implemented
//   for the two concrete pixel types the tracker needs (u8 and f32).
// - `Index<(usize, usize)>` so pixels read as `img[(x, y)]`.
// - `impl Iterator` return types for zero-cost pixel iteration.

use std::fmt;

use crate::geometry::CenterBox;

// ---------------------------------------------------------------------------
// Pixel Trait
// ---------------------------------------------------------------------------

/// Trait for types that can serve as pixel values in an Image.
pub trait Pixel: Copy + Default + Send + Sync + PartialOrd + 'static {
    /// Raw conversion to f32 (no normalization: u8 42 → 42.0).
    fn to_f32(self) -> f32;

    /// Construct a pixel from an f32 value, clamping and rounding as needed.
    fn from_f32(v: f32) -> Self;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        // `as u8` truncates, so clamp and round first.
        v.clamp(0.0, 255.0).round() as u8
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}

// ---------------------------------------------------------------------------
// Image<T>
// ---------------------------------------------------------------------------

/// A 2D image with runtime dimensions, row-major, no row padding.
#[derive(Clone, PartialEq)]
pub struct Image<T: Pixel> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Pixel> Image<T> {
    /// Create a zero-initialized image.
    pub fn new(width: usize, height: usize) -> Self {
        Image {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    /// Create an image with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Image {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Create an image from an existing row-major pixel vector.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image { data, width, height }
    }

    /// Build an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Image { data, width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// True when the image holds no pixels (either side is zero).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Get the pixel value at (x, y). x is column, y is row.
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.bounds_check(x, y);
        self.data[y * self.width + x] = value;
    }

    /// Borrow a single row as a slice.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Iterate over all pixels as `(x, y, value)`.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let w = self.width;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, &v)| (i % w, i / w, v))
    }

    /// Row-major pixel data.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the image, returning its row-major pixel buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Apply `f` to every pixel, producing an image of another pixel type.
    pub fn map<U: Pixel>(&self, f: impl Fn(T) -> U) -> Image<U> {
        Image {
            data: self.data.iter().map(|&v| f(v)).collect(),
            width: self.width,
            height: self.height,
        }
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for image {}×{}",
            self.width,
            self.height,
        );
    }
}

impl<T: Pixel + fmt::Debug> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Image<{}> {{ {}×{} }}",
            std::any::type_name::<T>(),
            self.width,
            self.height,
        )?;
        for y in 0..self.height.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(16) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self.get(x, y))?;
            }
            if self.width > 16 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}

impl<T: Pixel> std::ops::Index<(usize, usize)> for Image<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        self.bounds_check(x, y);
        &self.data[y * self.width + x]
    }
}

impl<T: Pixel> std::ops::IndexMut<(usize, usize)> for Image<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }
}

// ---------------------------------------------------------------------------
// Patch sampling
// ---------------------------------------------------------------------------

/// Crop the region described by `region` out of `src`.
///
/// The output is always `region.width × region.height`. Pixels that fall
/// outside the source are replicated from the nearest edge, so a box that
/// hangs off the frame still yields a full-size patch.
///
/// # Panics
/// Panics if `src` is empty or the region has a non-positive side.
pub fn extract_patch<T: Pixel>(src: &Image<T>, region: &CenterBox) -> Image<T> {
    assert!(!src.is_empty(), "cannot crop from an empty image");
    assert!(region.width >= 1 && region.height >= 1,
        "patch region must be at least 1×1, got {}×{}", region.width, region.height);

    let corners = region.corners();
    let max_x = src.width() as i64 - 1;
    let max_y = src.height() as i64 - 1;
    let w = region.width as usize;
    let h = region.height as usize;

    let mut out = Image::new(w, h);
    for j in 0..h {
        let sy = (corners.top as i64 + j as i64).clamp(0, max_y) as usize;
        let src_row = src.row(sy);
        let dst_row = out.row_mut(j);
        for (i, d) in dst_row.iter_mut().enumerate() {
            let sx = (corners.left as i64 + i as i64).clamp(0, max_x) as usize;
            *d = src_row[sx];
        }
    }
    out
}

/// Resize with bilinear interpolation, pixel-center aligned.
///
/// Destination pixel (dx, dy) samples the source at
/// `((dx + 0.5) * sx - 0.5, (dy + 0.5) * sy - 0.5)` where `sx = src_w / dst_w`,
/// clamped to the source bounds. This is the usual "area-consistent"
/// convention, so a constant image stays constant and an identity resize
/// is exact.
pub fn resize_bilinear<T: Pixel>(src: &Image<T>, dst_w: usize, dst_h: usize) -> Image<T> {
    assert!(!src.is_empty(), "cannot resize an empty image");
    if src.width() == dst_w && src.height() == dst_h {
        return src.clone();
    }

    let sx = src.width() as f32 / dst_w as f32;
    let sy = src.height() as f32 / dst_h as f32;

    // Horizontal taps are identical for every row; precompute them once.
    let x_taps: Vec<(usize, usize, f32)> = (0..dst_w)
        .map(|dx| axis_tap(dx, sx, src.width()))
        .collect();

    let mut out = Image::new(dst_w, dst_h);
    for dy in 0..dst_h {
        let (y0, y1, fy) = axis_tap(dy, sy, src.height());
        let r0 = src.row(y0);
        let r1 = src.row(y1);
        let dst_row = out.row_mut(dy);
        for (d, &(x0, x1, fx)) in dst_row.iter_mut().zip(&x_taps) {
            let top = r0[x0].to_f32() * (1.0 - fx) + r0[x1].to_f32() * fx;
            let bottom = r1[x0].to_f32() * (1.0 - fx) + r1[x1].to_f32() * fx;
            *d = T::from_f32(top * (1.0 - fy) + bottom * fy);
        }
    }
    out
}

/// Source indices and blend weight for one destination coordinate.
#[inline]
fn axis_tap(d: usize, scale: f32, len: usize) -> (usize, usize, f32) {
    let max = (len - 1) as f32;
    let s = ((d as f32 + 0.5) * scale - 0.5).clamp(0.0, max);
    let i0 = s.floor() as usize;
    let i1 = (i0 + 1).min(len - 1);
    (i0, i1, s - i0 as f32)
}
