// dataset.rs — Ground-truth annotations and image-sequence layout.
//
// Benchmark sequences ship one rectangle per line, either
//
//   12,34,56,78        (comma separated)
//   12 34 56 78        (whitespace / tab separated)
//
// The delimiter is picked once per file: any comma anywhere means commas.
// Reading stops at the first line that does not hold four integers, so
// trailing junk after the annotations is ignored. A file with no valid
// line at all is an error.
//
// On disk a sequence is a directory holding `groundtruth_rect.txt` and an
// `img/` folder of `.jpg` frames whose names sort into frame order.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TrackError};
use crate::geometry::Rect;

/// Annotation file name inside a sequence directory.
pub const GROUND_TRUTH_FILE: &str = "groundtruth_rect.txt";

/// Frame folder name inside a sequence directory.
pub const IMAGE_DIR: &str = "img";

/// Parse ground-truth rectangles from text.
pub fn parse_ground_truth(text: &str) -> Result<Vec<Rect>> {
    let comma = text.contains(',');
    let mut rects = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = if comma {
            line.split(',').map(str::trim).collect()
        } else {
            line.split_whitespace().collect()
        };
        match parse_rect(&fields) {
            Some(r) => rects.push(r),
            None => break,
        }
    }

    if rects.is_empty() {
        return Err(TrackError::Data("no ground-truth rectangles found".into()));
    }
    Ok(rects)
}

fn parse_rect(fields: &[&str]) -> Option<Rect> {
    if fields.len() < 4 {
        return None;
    }
    let mut v = [0i32; 4];
    for (slot, f) in v.iter_mut().zip(fields) {
        *slot = f.parse().ok()?;
    }
    Some(Rect::new(v[0], v[1], v[2], v[3]))
}

/// Read and parse a ground-truth file.
pub fn read_ground_truth(path: impl AsRef<Path>) -> Result<Vec<Rect>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| TrackError::Data(format!("cannot read {}: {e}", path.display())))?;
    let rects = parse_ground_truth(&text)?;
    debug!(path = %path.display(), count = rects.len(), "ground truth loaded");
    Ok(rects)
}

/// Sorted `.jpg` frame paths of a sequence directory's `img/` folder.
pub fn sequence_image_paths(sequence_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = sequence_dir.as_ref().join(IMAGE_DIR);
    let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
        .map_err(|e| TrackError::Resource(format!("cannot list {}: {e}", dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("jpg"))
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(TrackError::Resource(format!("no .jpg frames in {}", dir.display())));
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_separated() {
        let r = parse_ground_truth("1,2,30,40\n5,6,31,41\n").unwrap();
        assert_eq!(r, vec![Rect::new(1, 2, 30, 40), Rect::new(5, 6, 31, 41)]);
    }

    #[test]
    fn test_whitespace_separated() {
        let r = parse_ground_truth("1 2 30 40\n5\t6\t31\t41").unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r[1], Rect::new(5, 6, 31, 41));
    }

    #[test]
    fn test_stops_at_malformed_line() {
        let r = parse_ground_truth("1,2,3,4\nNaN,NaN,NaN,NaN\n5,6,7,8\n").unwrap();
        assert_eq!(r, vec![Rect::new(1, 2, 3, 4)]);
    }

    #[test]
    fn test_empty_is_error() {
        assert!(matches!(parse_ground_truth(""), Err(TrackError::Data(_))));
        assert!(matches!(parse_ground_truth("x y z w"), Err(TrackError::Data(_))));
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let err = read_ground_truth("/nonexistent/lpkcf/groundtruth_rect.txt").unwrap_err();
        assert!(matches!(err, TrackError::Data(_)));
    }
}
