// demos/live_view.rs
//
// Interactive tracking on an image sequence. The first frame is shown
// for target selection; once confirmed, the tracker runs through the
// sequence and draws the tracked box (green) and, when the sequence has
// annotations, the ground truth (red).
//
// Usage:
//   cargo run --example live_view --release -- /path/to/Basketball
//   cargo run --example live_view --release -- /path/to/Basketball --scale
//
// Selection (first frame):
//   drag   — draw the target box
//   W/A/S/D — nudge by one pixel
//   1 / 2  — grow / shrink by one pixel on every side
//   G      — use the first ground-truth box instead
//   Enter  — confirm and start tracking
//
// Tracking:
//   Space  — pause/resume
//   N      — step one frame (while paused)
//   H      — toggle the HOG inset of the current target
//   Q/Esc  — quit

use lpkcf::dataset::{read_ground_truth, sequence_image_paths, GROUND_TRUTH_FILE};
use lpkcf::hog::HogDescriptor;
use lpkcf::image::{extract_patch, resize_bilinear};
use lpkcf::selection::{SelectionEvent, SelectionState};
use lpkcf::{CenterBox, Frame, Image, Rect, Tracker, TrackerConfig};

use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::warn;
use tracing_subscriber::EnvFilter;

const TRACK_COLOR: u32 = 0x00FF40;
const TRUTH_COLOR: u32 = 0xFF3030;
const SELECT_COLOR: u32 = 0xFFD000;

/// Side of the patch the HOG inset is computed on, in pixels.
const INSET_PATCH: usize = 64;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <sequence_dir> [--scale]", args[0]);
        std::process::exit(1);
    }
    let seq_dir = PathBuf::from(&args[1]);
    let use_scale = args.iter().any(|a| a == "--scale");

    let paths = match sequence_image_paths(&seq_dir) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let truth = read_ground_truth(seq_dir.join(GROUND_TRUTH_FILE)).ok();
    println!("Sequence: {} ({} frames)", seq_dir.display(), paths.len());

    let first = load_grayscale(&paths[0]);
    let (img_w, img_h) = (first.width(), first.height());
    println!("Resolution: {}×{}", img_w, img_h);

    // Window at 2× scale for small images, 1× for large.
    let scale = if img_w <= 400 { 2 } else { 1 };
    let win_w = img_w * scale;
    let win_h = img_h * scale;

    let mut window = Window::new(
        "lpkcf — live view",
        win_w,
        win_h,
        WindowOptions {
            resize: false,
            ..WindowOptions::default()
        },
    )
    .expect("failed to create window");
    window.set_target_fps(60);

    let mut fb = vec![0u32; win_w * win_h];

    // ---- Selection ----
    let Some(initial) = select_target(&mut window, &mut fb, &first, scale, truth.as_deref()) else {
        println!("Selection aborted.");
        return;
    };
    println!("Target: {:?}", initial);

    // ---- Tracking ----
    let config = if use_scale { TrackerConfig::with_scale() } else { TrackerConfig::default() };
    let mut tracker = Tracker::new(config).expect("default configuration is valid");
    if let Err(e) = tracker.init(&Frame::from(first), initial) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let hog = HogDescriptor::new(8, 9, true, false).expect("valid HOG parameters");
    let mut frame_idx = 1;
    let mut paused = false;
    let mut show_hog = false;
    let start = Instant::now();

    println!("\nControls: Space=pause, N=step, H=HOG inset, Q/Esc=quit\n");

    while window.is_open() && !window.is_key_down(Key::Escape) && !window.is_key_down(Key::Q) {
        if window.is_key_pressed(Key::Space, KeyRepeat::No) {
            paused = !paused;
            println!("{}", if paused { "Paused" } else { "Resumed" });
        }
        if window.is_key_pressed(Key::H, KeyRepeat::No) {
            show_hog = !show_hog;
        }
        let step = window.is_key_pressed(Key::N, KeyRepeat::No);

        if (!paused || step) && frame_idx < paths.len() {
            let img = load_grayscale(&paths[frame_idx]);
            let frame = Frame::from(img);
            let rect = match tracker.step(&frame) {
                Ok(r) => r,
                Err(e) => {
                    warn!(frame = frame_idx, error = %e, "step failed");
                    tracker.target().unwrap_or(initial)
                }
            };
            let Frame::Gray(img) = frame else { unreachable!("frames are loaded as gray") };

            render_grayscale(&img, &mut fb, img_w, img_h, scale);
            if let Some(gt) = truth.as_ref().and_then(|t| t.get(frame_idx)) {
                draw_box(&mut fb, win_w, win_h, gt, scale, TRUTH_COLOR);
                print!("\r{:5}: {:?} iou={:.3}   ", frame_idx, rect, rect.iou(gt));
            } else {
                print!("\r{:5}: {:?}   ", frame_idx, rect);
            }
            draw_box(&mut fb, win_w, win_h, &rect, scale, TRACK_COLOR);
            if show_hog {
                draw_hog_inset(&mut fb, win_w, win_h, &hog, &img, &rect);
            }
            frame_idx += 1;
        }

        window.update_with_buffer(&fb, win_w, win_h).unwrap();
    }

    let secs = start.elapsed().as_secs_f64();
    println!("\n\nProcessed {} frames ({:.1} fps incl. decode and display).", frame_idx, frame_idx as f64 / secs.max(1e-9));
}

/// Run the selection state machine on the first frame. `None` if the
/// window was closed first.
fn select_target(
    window: &mut Window,
    fb: &mut [u32],
    img: &Image<u8>,
    scale: usize,
    truth: Option<&[Rect]>,
) -> Option<Rect> {
    let (img_w, img_h) = (img.width(), img.height());
    let (win_w, win_h) = (img_w * scale, img_h * scale);
    let mut sel = SelectionState::new(img_w, img_h);
    let mut was_down = false;

    println!("Drag to select the target, W/A/S/D to nudge, 1/2 to grow/shrink, G for ground truth, Enter to confirm.");

    while window.is_open() && !window.is_key_down(Key::Escape) {
        // Pointer, in image coordinates.
        if let Some((mx, my)) = window.get_mouse_pos(MouseMode::Clamp) {
            let (x, y) = ((mx as usize / scale) as i32, (my as usize / scale) as i32);
            let down = window.get_mouse_down(MouseButton::Left);
            let event = match (was_down, down) {
                (false, true) => Some(SelectionEvent::PointerDown { x, y }),
                (true, true) => Some(SelectionEvent::PointerMove { x, y }),
                (true, false) => Some(SelectionEvent::PointerUp { x, y }),
                (false, false) => None,
            };
            if let Some(e) = event {
                sel.handle(e);
            }
            was_down = down;
        }

        if window.is_key_pressed(Key::G, KeyRepeat::No) {
            if let Some(gt) = truth.and_then(|t| t.first()) {
                return Some(*gt);
            }
        }

        for key in window.get_keys_pressed(KeyRepeat::Yes) {
            let ch = match key {
                Key::W => 'w',
                Key::A => 'a',
                Key::S => 's',
                Key::D => 'd',
                Key::Key1 => '1',
                Key::Key2 => '2',
                Key::Enter | Key::NumPadEnter => '\n',
                _ => continue,
            };
            if let Some(rect) = SelectionEvent::from_key(ch).and_then(|e| sel.handle(e)) {
                if rect.is_valid() {
                    return Some(rect);
                }
                println!("Empty selection, draw a box first.");
            }
        }

        render_grayscale(img, fb, img_w, img_h, scale);
        let ((x0, y0), (x1, y1)) = sel.corners();
        let drawn = Rect::new(x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs());
        draw_box(fb, win_w, win_h, &drawn, scale, SELECT_COLOR);
        window.update_with_buffer(fb, win_w, win_h).unwrap();
    }
    None
}

// ---------------------------------------------------------------------------
// I/O
// ---------------------------------------------------------------------------

fn load_grayscale(path: &Path) -> Image<u8> {
    let img = image::open(path)
        .unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e));
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    Image::from_vec(w as usize, h as usize, gray.into_raw())
}

// ---------------------------------------------------------------------------
// Framebuffer rendering
// ---------------------------------------------------------------------------

/// Blit grayscale image to u32 framebuffer (with optional integer scale).
fn render_grayscale(img: &Image<u8>, fb: &mut [u32], img_w: usize, img_h: usize, scale: usize) {
    for y in 0..img_h {
        for x in 0..img_w {
            let v = img.get(x, y) as u32;
            let pixel = (v << 16) | (v << 8) | v; // 0x00RRGGBB
            for sy in 0..scale {
                for sx in 0..scale {
                    fb[(y * scale + sy) * (img_w * scale) + x * scale + sx] = pixel;
                }
            }
        }
    }
}

/// Two-pixel outline of an image-space rectangle.
fn draw_box(fb: &mut [u32], w: usize, h: usize, r: &Rect, scale: usize, color: u32) {
    let s = scale as i32;
    let (x0, y0) = (r.x * s, r.y * s);
    let (x1, y1) = ((r.x + r.width) * s - 1, (r.y + r.height) * s - 1);
    let mut put = |x: i32, y: i32| {
        if x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h {
            fb[y as usize * w + x as usize] = color;
        }
    };
    for t in 0..2 {
        for x in x0..=x1 {
            put(x, y0 + t);
            put(x, y1 - t);
        }
        for y in y0..=y1 {
            put(x0 + t, y);
            put(x1 - t, y);
        }
    }
}

/// HOG glyphs of the tracked target, drawn in the top-left corner.
fn draw_hog_inset(fb: &mut [u32], w: usize, h: usize, hog: &HogDescriptor, img: &Image<u8>, rect: &Rect) {
    let patch = resize_bilinear(&extract_patch(img, &CenterBox::from_rect(rect)), INSET_PATCH, INSET_PATCH);
    let Ok(features) = hog.compute(&patch) else { return };
    let Some(vis) = hog.render(&features) else { return };
    for y in 0..vis.height().min(h) {
        for x in 0..vis.width().min(w) {
            let v = vis.get(x, y) as u32;
            fb[y * w + x] = (v << 16) | (v << 8) | v;
        }
    }
}
