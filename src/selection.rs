// selection.rs — Interactive target selection as an explicit state machine.
//
// The UI layer (a window, a terminal, a test) owns a `SelectionState` and
// feeds it `SelectionEvent`s; nothing here knows about windows or keys
// beyond the default key map in `SelectionEvent::from_key`.
//
//   drag with the pointer          rough rectangle
//   w / a / s / d                  nudge up / left / down / right by 1 px
//   1 / 2                          grow / shrink by 1 px on every side
//   Enter                          confirm
//
// Confirming rounds width and height up to a multiple of 4 and clips the
// rectangle to the frame.

use crate::geometry::Rect;

/// Granularity the confirmed size is rounded up to.
const SIZE_MULTIPLE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Input to the selection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    PointerDown { x: i32, y: i32 },
    PointerMove { x: i32, y: i32 },
    PointerUp { x: i32, y: i32 },
    Nudge(Direction),
    Grow,
    Shrink,
    Confirm,
}

impl SelectionEvent {
    /// Default keyboard binding, `None` for unbound keys.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'w' => Some(SelectionEvent::Nudge(Direction::Up)),
            's' => Some(SelectionEvent::Nudge(Direction::Down)),
            'a' => Some(SelectionEvent::Nudge(Direction::Left)),
            'd' => Some(SelectionEvent::Nudge(Direction::Right)),
            '1' => Some(SelectionEvent::Grow),
            '2' => Some(SelectionEvent::Shrink),
            '\n' | '\r' => Some(SelectionEvent::Confirm),
            _ => None,
        }
    }
}

/// Rectangle being drawn over a `frame_width × frame_height` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    frame_width: i32,
    frame_height: i32,
    /// Top-left corner.
    start: (i32, i32),
    /// Bottom-right corner.
    end: (i32, i32),
    dragging: bool,
    confirmed: Option<Rect>,
}

impl SelectionState {
    pub fn new(frame_width: usize, frame_height: usize) -> Self {
        SelectionState {
            frame_width: frame_width as i32,
            frame_height: frame_height as i32,
            start: (0, 0),
            end: (0, 0),
            dragging: false,
            confirmed: None,
        }
    }

    /// Current corners as drawn, `(top_left, bottom_right)`.
    pub fn corners(&self) -> ((i32, i32), (i32, i32)) {
        (self.start, self.end)
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// The confirmed rectangle, once `Confirm` has been handled.
    pub fn confirmed(&self) -> Option<Rect> {
        self.confirmed
    }

    /// Apply one event. Returns the final rectangle on `Confirm`.
    pub fn handle(&mut self, event: SelectionEvent) -> Option<Rect> {
        let max_x = self.frame_width - 1;
        let max_y = self.frame_height - 1;
        match event {
            SelectionEvent::PointerDown { x, y } => {
                self.start = (x, y);
                self.end = (x, y);
                self.dragging = true;
            }
            SelectionEvent::PointerMove { x, y } => {
                if self.dragging {
                    self.end = (x, y);
                }
            }
            SelectionEvent::PointerUp { x, y } => {
                // A drag may run in any direction; keep start top-left.
                let (sx, sy) = self.start;
                self.start = (sx.min(x), sy.min(y));
                self.end = (sx.max(x), sy.max(y));
                self.dragging = false;
            }
            SelectionEvent::Nudge(Direction::Left) => {
                self.start.0 = (self.start.0 - 1).max(0);
                self.end.0 -= 1;
            }
            SelectionEvent::Nudge(Direction::Right) => {
                self.start.0 += 1;
                self.end.0 = (self.end.0 + 1).min(max_x);
            }
            SelectionEvent::Nudge(Direction::Up) => {
                self.start.1 = (self.start.1 - 1).max(0);
                self.end.1 -= 1;
            }
            SelectionEvent::Nudge(Direction::Down) => {
                self.start.1 += 1;
                self.end.1 = (self.end.1 + 1).min(max_y);
            }
            SelectionEvent::Grow => {
                self.start.0 = (self.start.0 - 1).max(0);
                self.start.1 = (self.start.1 - 1).max(0);
                self.end.0 = (self.end.0 + 1).min(max_x);
                self.end.1 = (self.end.1 + 1).min(max_y);
            }
            SelectionEvent::Shrink => {
                self.start.0 += 1;
                self.start.1 += 1;
                self.end.0 -= 1;
                self.end.1 -= 1;
            }
            SelectionEvent::Confirm => {
                let rect = self.finalize();
                self.confirmed = Some(rect);
                return Some(rect);
            }
        }
        None
    }

    fn finalize(&self) -> Rect {
        let (x0, x1) = (self.start.0.min(self.end.0), self.start.0.max(self.end.0));
        let (y0, y1) = (self.start.1.min(self.end.1), self.start.1.max(self.end.1));
        let w = round_up(x1 - x0);
        let h = round_up(y1 - y0);
        Rect::new(x0, y0, w, h).clip_to(self.frame_width, self.frame_height)
    }
}

fn round_up(v: i32) -> i32 {
    match v % SIZE_MULTIPLE {
        0 => v,
        r => v + SIZE_MULTIPLE - r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(s: &mut SelectionState, from: (i32, i32), to: (i32, i32)) {
        s.handle(SelectionEvent::PointerDown { x: from.0, y: from.1 });
        s.handle(SelectionEvent::PointerMove { x: to.0, y: to.1 });
        s.handle(SelectionEvent::PointerUp { x: to.0, y: to.1 });
    }

    #[test]
    fn test_drag_and_confirm_rounds_up() {
        let mut s = SelectionState::new(320, 240);
        drag(&mut s, (10, 20), (31, 45));
        assert!(!s.is_dragging());
        let r = s.handle(SelectionEvent::Confirm).unwrap();
        assert_eq!(r, Rect::new(10, 20, 24, 28));
        assert_eq!(s.confirmed(), Some(r));
    }

    #[test]
    fn test_reverse_drag_anchors_top_left() {
        let mut s = SelectionState::new(320, 240);
        drag(&mut s, (31, 45), (10, 20));
        assert_eq!(s.corners(), ((10, 20), (31, 45)));
        let r = s.handle(SelectionEvent::Confirm).unwrap();
        assert_eq!(r, Rect::new(10, 20, 24, 28));
    }

    #[test]
    fn test_diagonal_reverse_drag() {
        let mut s = SelectionState::new(320, 240);
        drag(&mut s, (10, 45), (31, 20));
        let r = s.handle(SelectionEvent::Confirm).unwrap();
        assert_eq!(r, Rect::new(10, 20, 24, 28));
    }

    #[test]
    fn test_move_without_press_ignored() {
        let mut s = SelectionState::new(100, 100);
        s.handle(SelectionEvent::PointerMove { x: 50, y: 50 });
        assert_eq!(s.corners(), ((0, 0), (0, 0)));
    }

    #[test]
    fn test_nudge_and_grow() {
        let mut s = SelectionState::new(100, 100);
        drag(&mut s, (10, 10), (20, 20));
        s.handle(SelectionEvent::Nudge(Direction::Right));
        s.handle(SelectionEvent::Nudge(Direction::Down));
        assert_eq!(s.corners(), ((11, 11), (21, 21)));
        s.handle(SelectionEvent::Grow);
        assert_eq!(s.corners(), ((10, 10), (22, 22)));
        s.handle(SelectionEvent::Shrink);
        assert_eq!(s.corners(), ((11, 11), (21, 21)));
    }

    #[test]
    fn test_grow_clamped_to_frame() {
        let mut s = SelectionState::new(50, 40);
        drag(&mut s, (0, 0), (49, 39));
        s.handle(SelectionEvent::Grow);
        assert_eq!(s.corners(), ((0, 0), (49, 39)));
    }

    #[test]
    fn test_confirm_clips_to_frame() {
        let mut s = SelectionState::new(64, 64);
        drag(&mut s, (50, 50), (63, 63));
        let r = s.handle(SelectionEvent::Confirm).unwrap();
        // 13 rounds up to 16, then clipped at the frame edge.
        assert_eq!(r, Rect::new(50, 50, 14, 14));
    }

    #[test]
    fn test_key_map() {
        assert_eq!(SelectionEvent::from_key('a'), Some(SelectionEvent::Nudge(Direction::Left)));
        assert_eq!(SelectionEvent::from_key('\r'), Some(SelectionEvent::Confirm));
        assert_eq!(SelectionEvent::from_key('x'), None);
    }
}
