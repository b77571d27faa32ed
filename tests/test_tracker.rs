// tests/test_tracker.rs — End-to-end tracker tests on synthetic sequences.
//
// Scenes are generated procedurally so expected positions are known
// exactly. Tolerances are a few pixels: the new center is rounded from a
// sub-cell peak, and each cell spans several pixels of the search window.

use lpkcf::convert::PixelLayout;
use lpkcf::features::FeatureKind;
use lpkcf::{
    run_sequence, Frame, Image, Rect, TrackError, Tracker, TrackerConfig, TrackerState, VecSource,
};

/// Textured square of side `side` with its top-left corner at (x0, y0)
/// on a mildly textured dark background.
fn square_scene(w: usize, h: usize, x0: i32, y0: i32, side: i32) -> Image<u8> {
    Image::from_fn(w, h, |x, y| {
        let (dx, dy) = (x as i32 - x0, y as i32 - y0);
        if (0..side).contains(&dx) && (0..side).contains(&dy) {
            let (bx, by) = (dx / 4, dy / 4);
            (110 + ((bx * 5 + by * 3 + bx * by) % 7) * 20) as u8
        } else {
            (15 + ((x / 9 + y / 11) % 3) * 5) as u8
        }
    })
}

/// Bright disk of `radius` centered at (cx, cy) on black.
fn disk_scene(w: usize, h: usize, cx: f32, cy: f32, radius: f32) -> Image<u8> {
    Image::from_fn(w, h, |x, y| {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        if dx * dx + dy * dy <= radius * radius { 220 } else { 10 }
    })
}

fn center(r: &Rect) -> (f64, f64) {
    r.center()
}

// ===== Translation =====

#[test]
fn follows_translating_square() {
    let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();
    let side = 32;
    let (mut x0, mut y0) = (60, 50);
    let first = Frame::from(square_scene(240, 200, x0, y0, side));
    tracker.init(&first, Rect::new(x0, y0, side, side)).unwrap();

    for _ in 0..8 {
        x0 += 4;
        y0 += 3;
        let frame = Frame::from(square_scene(240, 200, x0, y0, side));
        let r = tracker.step(&frame).unwrap();
        let (cx, cy) = center(&r);
        let (tx, ty) = center(&Rect::new(x0, y0, side, side));
        assert!(
            (cx - tx).abs() <= 4.0 && (cy - ty).abs() <= 4.0,
            "tracked center ({cx}, {cy}) vs truth ({tx}, {ty})"
        );
        assert_eq!((r.width, r.height), (side, side), "size must not change without scale");
    }
    assert_eq!(tracker.frames_tracked(), 8);
    assert_eq!(tracker.state(), TrackerState::Located);
}

#[test]
fn raw_features_follow_translating_square() {
    let mut cfg = TrackerConfig::default();
    cfg.translation.features = FeatureKind::Raw;
    let mut tracker = Tracker::new(cfg).unwrap();

    let side = 32;
    let (mut x0, y0) = (70, 60);
    tracker
        .init(&Frame::from(square_scene(240, 200, x0, y0, side)), Rect::new(x0, y0, side, side))
        .unwrap();
    for _ in 0..5 {
        x0 += 3;
        let r = tracker.step(&Frame::from(square_scene(240, 200, x0, y0, side))).unwrap();
        let (cx, _) = center(&r);
        let (tx, _) = center(&Rect::new(x0, y0, side, side));
        assert!((cx - tx).abs() <= 5.0, "tracked x {cx} vs truth {tx}");
    }
}

#[test]
fn static_scene_stays_put() {
    let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();
    let img = square_scene(200, 160, 80, 60, 28);
    let frame = Frame::from(img);
    tracker.init(&frame, Rect::new(80, 60, 28, 28)).unwrap();
    let start = tracker.target().unwrap();
    for _ in 0..5 {
        let r = tracker.step(&frame).unwrap();
        assert!((r.x - start.x).abs() <= 2 && (r.y - start.y).abs() <= 2, "{r:?} vs {start:?}");
    }
}

#[test]
fn static_scene_keeps_center_on_odd_window() {
    // 30 px box, 75 px window: the peak maps to a whole pixel, no half-pixel slack.
    let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();
    let frame = Frame::from(square_scene(200, 160, 80, 60, 30));
    tracker.init(&frame, Rect::new(80, 60, 30, 30)).unwrap();
    assert_eq!(tracker.window_box().unwrap().width, 75);
    let start = tracker.target_box().unwrap();
    for _ in 0..6 {
        tracker.step(&frame).unwrap();
        let b = tracker.target_box().unwrap();
        assert!((b.cx - start.cx).abs() <= 1 && (b.cy - start.cy).abs() <= 1, "{b:?} vs {start:?}");
    }
}

#[test]
fn color_frames_track_like_gray() {
    let gray = square_scene(160, 120, 50, 40, 24);
    let rgb: Vec<u8> = gray.as_slice().iter().flat_map(|&v| [v, v, v]).collect();
    let color = Frame::Color { width: 160, height: 120, layout: PixelLayout::Rgb, data: rgb };

    let mut a = Tracker::new(TrackerConfig::default()).unwrap();
    let mut b = Tracker::new(TrackerConfig::default()).unwrap();
    a.init(&Frame::from(gray.clone()), Rect::new(50, 40, 24, 24)).unwrap();
    b.init(&color, Rect::new(50, 40, 24, 24)).unwrap();
    assert_eq!(a.step(&Frame::from(gray)).unwrap(), b.step(&color).unwrap());
}

// ===== Scale =====

#[test]
fn scale_channel_detects_growth() {
    let mut tracker = Tracker::new(TrackerConfig::with_scale()).unwrap();
    let first = Frame::from(disk_scene(160, 160, 80.0, 80.0, 13.0));
    tracker.init(&first, Rect::new(48, 48, 64, 64)).unwrap();

    let grown = Frame::from(disk_scene(160, 160, 80.0, 80.0, 26.0));
    let r = tracker.step(&grown).unwrap();
    assert!(r.width > 72, "width {} did not grow", r.width);
    assert!(r.height > 72, "height {} did not grow", r.height);
    assert_eq!(r.width, r.height);
}

#[test]
fn scale_channel_keeps_size_on_static_scene() {
    let mut tracker = Tracker::new(TrackerConfig::with_scale()).unwrap();
    let frame = Frame::from(disk_scene(160, 160, 80.0, 80.0, 16.0));
    tracker.init(&frame, Rect::new(48, 48, 64, 64)).unwrap();
    for _ in 0..3 {
        let r = tracker.step(&frame).unwrap();
        assert!((r.width - 64).abs() <= 4, "width drifted to {}", r.width);
    }
}

#[test]
fn scale_update_recomputes_window() {
    let mut tracker = Tracker::new(TrackerConfig::with_scale()).unwrap();
    tracker
        .init(&Frame::from(disk_scene(160, 160, 80.0, 80.0, 13.0)), Rect::new(48, 48, 64, 64))
        .unwrap();
    tracker.step(&Frame::from(disk_scene(160, 160, 80.0, 80.0, 26.0))).unwrap();
    let target = tracker.target_box().unwrap();
    let window = tracker.window_box().unwrap();
    assert_eq!(window.width, (target.width as f64 * 2.5).round() as i32);
    assert_eq!(window.height, (target.height as f64 * 2.5).round() as i32);
}

#[test]
fn one_pixel_target_survives_scale_updates() {
    let mut tracker = Tracker::new(TrackerConfig::with_scale()).unwrap();
    let frame = Frame::from(Image::filled(64, 64, 90u8));
    tracker.init(&frame, Rect::new(30, 30, 1, 1)).unwrap();
    let window = tracker.window_box().unwrap();
    assert_eq!((window.width, window.height), (2, 2));

    for _ in 0..5 {
        let r = tracker.step(&frame).unwrap();
        assert_eq!((r.width, r.height), (1, 1), "size must never drop below one pixel");
        assert_eq!(r, Rect::new(30, 30, 1, 1));
        assert_eq!(tracker.window_box().unwrap(), window);
    }
}

// ===== Lifecycle & errors =====

#[test]
fn step_before_init_fails() {
    let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();
    let frame = Frame::from(square_scene(64, 64, 10, 10, 16));
    assert!(matches!(tracker.step(&frame), Err(TrackError::NotInitialized)));
    assert_eq!(tracker.state(), TrackerState::Uninitialized);
    assert_eq!(tracker.target(), None);
}

#[test]
fn reinit_resets_session() {
    let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();
    let frame = Frame::from(square_scene(160, 120, 40, 40, 24));
    tracker.init(&frame, Rect::new(40, 40, 24, 24)).unwrap();
    tracker.step(&frame).unwrap();
    tracker.step(&frame).unwrap();
    assert_eq!(tracker.frames_tracked(), 2);

    tracker.init(&frame, Rect::new(90, 60, 20, 20)).unwrap();
    assert_eq!(tracker.frames_tracked(), 0);
    assert_eq!(tracker.state(), TrackerState::Ready);
    assert_eq!(tracker.target_box().unwrap().width, 20);
}

#[test]
fn init_outside_frame_is_clamped() {
    let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();
    let frame = Frame::from(square_scene(100, 80, 10, 10, 16));
    tracker.init(&frame, Rect::new(150, 120, 16, 16)).unwrap();
    let b = tracker.target_box().unwrap();
    assert_eq!((b.cx, b.cy), (99, 79));
    // Steps still work with the window hanging off the frame.
    tracker.step(&frame).unwrap();
}

#[test]
fn invalid_config_rejected_at_construction() {
    let mut cfg = TrackerConfig::with_scale();
    cfg.scale.min_radius_ratio = 1.5;
    assert!(matches!(Tracker::new(cfg), Err(TrackError::Config(_))));
}

// ===== Sequence driver =====

#[test]
fn run_sequence_reports_every_frame() {
    let side = 28;
    let frames: Vec<Frame> = (0..6)
        .map(|i| Frame::from(square_scene(200, 160, 60 + 3 * i, 50 + 2 * i, side)))
        .collect();
    let mut source = VecSource::new(frames);
    let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();

    let mut seen = Vec::new();
    let n = run_sequence(&mut source, &mut tracker, Rect::new(60, 50, side, side), |i, f, r| {
        assert_eq!(f.width(), 200);
        seen.push((i, r));
    })
    .unwrap();

    assert_eq!(n, 6);
    assert_eq!(seen.len(), 6);
    assert!(seen.iter().enumerate().all(|(k, &(i, _))| k == i));
    let (_, first) = seen[0];
    assert!((first.x - 60).abs() <= 1 && (first.y - 50).abs() <= 1);
    let (_, last) = seen[5];
    assert!((last.x - 75).abs() <= 4 && (last.y - 60).abs() <= 4, "last = {last:?}");
    assert_eq!(tracker.frames_tracked(), 5);
}

#[test]
fn run_sequence_stops_at_empty_frame() {
    let img = square_scene(120, 100, 40, 30, 20);
    let frames = vec![
        Frame::from(img.clone()),
        Frame::from(img.clone()),
        Frame::from(Image::<u8>::new(0, 0)),
        Frame::from(img),
    ];
    let mut source = VecSource::new(frames);
    let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();
    let n = run_sequence(&mut source, &mut tracker, Rect::new(40, 30, 20, 20), |_, _, _| {}).unwrap();
    assert_eq!(n, 2);
    assert_eq!(source.remaining(), 1);
}

#[test]
fn run_sequence_on_empty_source_does_nothing() {
    let mut source = VecSource::new(Vec::new());
    let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();
    let n = run_sequence(&mut source, &mut tracker, Rect::new(0, 0, 8, 8), |_, _, _| {
        panic!("sink must not be called")
    })
    .unwrap();
    assert_eq!(n, 0);
    assert_eq!(tracker.state(), TrackerState::Uninitialized);
}
