// demos/track_sequence.rs
//
// Run the tracker over a benchmark sequence and score it against the
// ground truth.
//
// A sequence directory holds `groundtruth_rect.txt` and `img/*.jpg`
// (the layout of the OTB benchmark). The tracker is initialized on the
// first annotation and stepped through every frame; per-frame IoU and
// center error are printed, followed by a summary.
//
// Usage:
//   cargo run --example track_sequence --release -- /path/to/Basketball
//   cargo run --example track_sequence --release -- /path/to/Basketball config.json
//   RUST_LOG=lpkcf=debug cargo run --example track_sequence --release -- /path/to/Basketball
//
// The optional JSON file holds a (partial) `TrackerConfig`; missing fields
// take their defaults. Example enabling the scale channel:
//   { "scale": { "enabled": true } }

use lpkcf::dataset::{read_ground_truth, sequence_image_paths, GROUND_TRUTH_FILE};
use lpkcf::{run_sequence, Frame, FrameSource, Image, TrackError, Tracker, TrackerConfig};

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing_subscriber::EnvFilter;

/// Center error threshold for the precision score, in pixels.
const PRECISION_THRESHOLD: f64 = 20.0;

/// IoU threshold for the success score.
const SUCCESS_THRESHOLD: f64 = 0.5;

/// Frames decoded lazily from a list of image files.
struct ImageFiles {
    paths: std::vec::IntoIter<PathBuf>,
}

impl FrameSource for ImageFiles {
    fn next_frame(&mut self) -> lpkcf::Result<Option<Frame>> {
        match self.paths.next() {
            None => Ok(None),
            Some(path) => load_grayscale(&path).map(|img| Some(Frame::from(img))),
        }
    }
}

fn load_grayscale(path: &Path) -> lpkcf::Result<Image<u8>> {
    let img = image::open(path)
        .map_err(|e| TrackError::Resource(format!("cannot decode {}: {e}", path.display())))?;
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    Ok(Image::from_vec(w as usize, h as usize, gray.into_raw()))
}

fn load_config(path: &Path) -> lpkcf::Result<TrackerConfig> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| TrackError::Config(format!("{}: {e}", path.display())))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <sequence_dir> [config.json]", args[0]);
        std::process::exit(1);
    }

    if let Err(e) = run(Path::new(&args[1]), args.get(2).map(Path::new)) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(seq_dir: &Path, config_path: Option<&Path>) -> lpkcf::Result<()> {
    let config = match config_path {
        Some(p) => load_config(p)?,
        None => TrackerConfig::default(),
    };
    let truth = read_ground_truth(seq_dir.join(GROUND_TRUTH_FILE))?;
    let paths = sequence_image_paths(seq_dir)?;

    println!("Sequence: {} ({} frames, {} annotations)", seq_dir.display(), paths.len(), truth.len());
    println!(
        "Config: padding={} pattern={} cell={} features={:?} scale={}",
        config.translation.padding,
        config.translation.pattern_size,
        config.translation.cell_size,
        config.translation.features,
        config.scale.enabled,
    );

    let mut tracker = Tracker::new(config)?;
    let mut source = ImageFiles { paths: paths.into_iter() };

    let mut ious = Vec::new();
    let mut errors = Vec::new();
    let start = Instant::now();

    println!("\n{:>6}  {:>5} {:>5} {:>5} {:>5}  {:>6}  {:>7}", "frame", "x", "y", "w", "h", "iou", "err_px");
    let frames = run_sequence(&mut source, &mut tracker, truth[0], |i, _frame, rect| {
        let Some(gt) = truth.get(i) else {
            println!("{i:>6}  {:>5} {:>5} {:>5} {:>5}", rect.x, rect.y, rect.width, rect.height);
            return;
        };
        let iou = rect.iou(gt);
        let err = rect.center_distance(gt);
        ious.push(iou);
        errors.push(err);
        println!(
            "{i:>6}  {:>5} {:>5} {:>5} {:>5}  {iou:>6.3}  {err:>7.2}",
            rect.x, rect.y, rect.width, rect.height
        );
    })?;
    let elapsed = start.elapsed().as_secs_f64();

    let scored = ious.len().max(1) as f64;
    let mean_iou = ious.iter().sum::<f64>() / scored;
    let mean_err = errors.iter().sum::<f64>() / scored;
    let precision = errors.iter().filter(|&&e| e <= PRECISION_THRESHOLD).count() as f64 / scored;
    let success = ious.iter().filter(|&&v| v >= SUCCESS_THRESHOLD).count() as f64 / scored;

    println!("\n=== Summary ===");
    println!("Frames:          {frames}");
    println!("Mean IoU:        {mean_iou:.3}");
    println!("Mean center err: {mean_err:.2} px");
    println!("Precision@{PRECISION_THRESHOLD:.0}px:  {:.1}%", precision * 100.0);
    println!("Success@{SUCCESS_THRESHOLD}:    {:.1}%", success * 100.0);
    println!("Speed:           {:.1} fps (including decode)", frames as f64 / elapsed.max(1e-9));
    Ok(())
}
