// geometry.rs — Corner-form rectangles and integer center boxes.
//
// The outside world speaks in corner rectangles (x, y, w, h): dataset
// annotations, selection UIs and the per-frame output. Internally the
// tracker keeps an integer center plus size, because every update is a
// displacement of the center and every patch is cut symmetrically around
// it.
//
// For an even side there is no pixel exactly in the middle, so the center
// sits on the pixel just left of (above) the midpoint:
//
//   w = 5:  x x C x x        cx = x + w/2
//   w = 4:  x C x x          cx = x + w/2 - 1
//
// `CenterBox::corners` inverts that rule exactly, so a rect survives the
// round trip `from_rect` → `corners` unchanged. `to_rect` is the rounding
// form the tracker reports, which can land one pixel left (up) of the
// input corner on an even side.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in corner form, integer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect { x, y, width, height }
    }

    /// True when both sides are at least one pixel.
    pub fn is_valid(&self) -> bool {
        self.width >= 1 && self.height >= 1
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Geometric center in continuous coordinates.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 * 0.5,
            self.y as f64 + self.height as f64 * 0.5,
        )
    }

    /// Intersection with another rectangle; zero-sized if they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        Rect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }

    /// Intersection-over-union, in [0, 1]. Two empty rects score 0.
    pub fn iou(&self, other: &Rect) -> f64 {
        let inter = self.intersect(other).area();
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            0.0
        } else {
            inter as f64 / union as f64
        }
    }

    /// Euclidean distance between the two centers.
    pub fn center_distance(&self, other: &Rect) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Clip to a `width × height` frame.
    pub fn clip_to(&self, width: i32, height: i32) -> Rect {
        self.intersect(&Rect::new(0, 0, width, height))
    }
}

// ---------------------------------------------------------------------------
// CenterBox
// ---------------------------------------------------------------------------

/// Inclusive pixel bounds of a [`CenterBox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corners {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Integer center plus size. Used for both the target box and the padded
/// search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CenterBox {
    pub cx: i32,
    pub cy: i32,
    pub width: i32,
    pub height: i32,
}

impl CenterBox {
    pub const fn new(cx: i32, cy: i32, width: i32, height: i32) -> Self {
        CenterBox { cx, cy, width, height }
    }

    /// Center box of a corner rectangle, using the even-side parity rule.
    pub fn from_rect(r: &Rect) -> Self {
        CenterBox {
            cx: r.x + half_toward_start(r.width),
            cy: r.y + half_toward_start(r.height),
            width: r.width,
            height: r.height,
        }
    }

    /// Inclusive pixel bounds; exact inverse of [`CenterBox::from_rect`].
    pub fn corners(&self) -> Corners {
        Corners {
            left: self.cx - half_toward_start(self.width),
            top: self.cy - half_toward_start(self.height),
            right: self.cx + self.width / 2,
            bottom: self.cy + self.height / 2,
        }
    }

    /// Corner rectangle as reported per frame: `x = round(cx - w/2)`.
    pub fn to_rect(&self) -> Rect {
        Rect {
            x: round_half_up(self.cx as f64 - self.width as f64 * 0.5),
            y: round_half_up(self.cy as f64 - self.height as f64 * 0.5),
            width: self.width,
            height: self.height,
        }
    }

    /// Search window around this box, each side grown to `floor(s * (1 + padding))`.
    pub fn padded(&self, padding: f64) -> CenterBox {
        CenterBox {
            width: (self.width as f64 * (1.0 + padding)).floor() as i32,
            height: (self.height as f64 * (1.0 + padding)).floor() as i32,
            ..*self
        }
    }

    /// Like [`CenterBox::padded`] but rounding, used after a scale update.
    pub fn padded_rounded(&self, padding: f64) -> CenterBox {
        CenterBox {
            width: (self.width as f64 * (1.0 + padding)).round() as i32,
            height: (self.height as f64 * (1.0 + padding)).round() as i32,
            ..*self
        }
    }

    /// Same center, new size.
    pub fn with_size(&self, width: i32, height: i32) -> CenterBox {
        CenterBox { width, height, ..*self }
    }

    /// Clamp the center into a `width × height` frame.
    pub fn clamp_center(&self, width: i32, height: i32) -> CenterBox {
        CenterBox {
            cx: self.cx.clamp(0, (width - 1).max(0)),
            cy: self.cy.clamp(0, (height - 1).max(0)),
            ..*self
        }
    }
}

/// Offset from the first pixel to the center pixel along one side.
#[inline]
fn half_toward_start(side: i32) -> i32 {
    if side % 2 == 1 {
        side / 2
    } else {
        side / 2 - 1
    }
}

#[inline]
fn round_half_up(v: f64) -> i32 {
    (v + 0.5).floor() as i32
}
