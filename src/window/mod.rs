//! Episode window reconstruction.
//!
//! An episode on one lane runs from the last start marker at or before the
//! first identifier hit to the first end marker at or after the last hit.
//! When either marker is missing from the hit's own file, the adjacent
//! rotation file on that side is consulted; when that fails too, the edge of
//! the available corpus bounds the episode.

pub mod neighbor;

use crate::anchor::{Anchor, AnchorSet, ScanResult};
use crate::source::reader::LogLine;
use crate::source::rotation::Direction;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub use neighbor::{NeighborSource, RotatedNeighbors};

/// Where one side of a window came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Marker found in the hit's own file
    Local,
    /// Marker found in the adjacent rotation file
    Neighbor,
    /// No marker available; the window stops at the corpus edge
    CorpusEdge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub lines: Vec<LogLine>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Contributing files in line order
    pub files: Vec<PathBuf>,
    pub start_boundary: Boundary,
    pub end_boundary: Boundary,
}

/// Resolve the episode window around the identifier hits of `local`.
///
/// `focus` is the raw line position of the hit that created the message; when
/// given, only hits inside that hit's episode are considered, so an
/// identifier recurring in several episodes of one lane yields one window per
/// episode. Returns `None` when the scan holds no hit at all.
pub fn resolve_window(
    local: ScanResult,
    focus: Option<usize>,
    neighbors: &dyn NeighborSource,
) -> Option<Window> {
    let hits = focused_hits(&local, focus);
    let (Some(first_hit), Some(last_hit)) = (hits.first(), hits.last()) else {
        warn!(file = %local.file.display(), "No identifier hit on lane, nothing to resolve");
        return None;
    };
    let (first_hit, last_hit) = (first_hit.index, last_hit.index);

    let ScanResult {
        file,
        lines,
        anchors,
    } = local;

    let mut files = Vec::new();
    let mut combined = Vec::new();

    // Start side
    let preceding = anchors.starts.partition_point(|s| s.index <= first_hit);
    let (local_lo, start, start_boundary) = if preceding > 0 {
        let marker = anchors.starts[preceding - 1];
        (marker.index, marker_time(&marker, &file, "start"), Boundary::Local)
    } else {
        let side = borrow_side(&file, Direction::Previous, neighbors);
        if let Some(neighbor_file) = side.file {
            files.push(neighbor_file);
        }
        combined.extend(side.lines);
        (0, side.time, side.boundary)
    };

    // End side, left-leaning: an end marker on the last hit's own line counts
    let following = anchors.ends.partition_point(|e| e.index < last_hit);
    let (local_hi, end_marker) = match anchors.ends.get(following) {
        Some(marker) => (marker.index, Some(*marker)),
        None => (lines.len() - 1, None),
    };

    files.push(file.clone());
    combined.extend(lines[local_lo..=local_hi].iter().cloned());

    let (end, end_boundary) = match end_marker {
        Some(marker) => (marker_time(&marker, &file, "end"), Boundary::Local),
        None => {
            let side = borrow_side(&file, Direction::Next, neighbors);
            if let Some(neighbor_file) = side.file {
                files.push(neighbor_file);
            }
            combined.extend(side.lines);
            (side.time, side.boundary)
        }
    };

    debug!(
        file = %file.display(),
        lines = combined.len(),
        start_boundary = ?start_boundary,
        end_boundary = ?end_boundary,
        "Resolved episode window"
    );

    Some(Window {
        lines: combined,
        start,
        end,
        files,
        start_boundary,
        end_boundary,
    })
}

/// Lines and boundary contributed by one neighbor file.
struct BorrowedSide {
    lines: Vec<LogLine>,
    time: Option<DateTime<Utc>>,
    boundary: Boundary,
    file: Option<PathBuf>,
}

/// Take the previous file's tail from its last start marker, or the next
/// file's head through its first end marker. A neighbor without the marker
/// contributes everything it has on the lane.
fn borrow_side(file: &Path, direction: Direction, neighbors: &dyn NeighborSource) -> BorrowedSide {
    let Some(scan) = neighbors.neighbor(file, direction) else {
        return BorrowedSide {
            lines: Vec::new(),
            time: None,
            boundary: Boundary::CorpusEdge,
            file: None,
        };
    };

    let marker = match direction {
        Direction::Previous => scan.anchors.starts.last().copied(),
        Direction::Next => scan.anchors.ends.first().copied(),
    };
    let contributing = (!scan.lines.is_empty()).then(|| scan.file.clone());

    match marker {
        Some(marker) => {
            let lines = match direction {
                Direction::Previous => scan.lines[marker.index..].to_vec(),
                Direction::Next => scan.lines[..=marker.index].to_vec(),
            };
            let side = match direction {
                Direction::Previous => "start",
                Direction::Next => "end",
            };
            BorrowedSide {
                lines,
                time: marker_time(&marker, &scan.file, side),
                boundary: Boundary::Neighbor,
                file: contributing,
            }
        }
        None => {
            warn!(
                file = %file.display(),
                neighbor = %scan.file.display(),
                direction = %direction,
                "Episode marker missing from neighbor too, corpus edge is the boundary"
            );
            BorrowedSide {
                lines: scan.lines,
                time: None,
                boundary: Boundary::CorpusEdge,
                file: contributing,
            }
        }
    }
}

fn marker_time(marker: &Anchor, file: &Path, side: &str) -> Option<DateTime<Utc>> {
    if marker.timestamp.is_none() {
        warn!(
            file = %file.display(),
            position = marker.index,
            side = side,
            "Episode marker has no parseable timestamp, leaving it unresolved"
        );
    }
    marker.timestamp
}

/// Hits of the episode that contains `focus`, or all hits without a focus.
fn focused_hits(local: &ScanResult, focus: Option<usize>) -> Vec<Anchor> {
    let AnchorSet { starts, ends, hits } = &local.anchors;
    let Some(at) = focus.and_then(|line| local.position_of(line)) else {
        return hits.clone();
    };

    let lo = starts
        .iter()
        .rev()
        .find(|s| s.index <= at)
        .map_or(0, |s| s.index);
    let hi = ends
        .iter()
        .find(|e| e.index >= at)
        .map_or(usize::MAX, |e| e.index);

    hits.iter()
        .filter(|h| h.index >= lo && h.index <= hi)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::AnchorScanner;
    use crate::family::IdMatcher;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;

    const START: &str = "Accept connection";
    const END: &str = "Scan finished";
    const KEY: &str = "[7:7]";
    const ID: &str = "abc@host";

    #[derive(Default)]
    struct MemoryNeighbors {
        files: HashMap<(PathBuf, &'static str), ScanResult>,
    }

    impl MemoryNeighbors {
        fn with(mut self, from: &str, direction: Direction, scan: ScanResult) -> Self {
            let tag = match direction {
                Direction::Previous => "prev",
                Direction::Next => "next",
            };
            self.files.insert((PathBuf::from(from), tag), scan);
            self
        }
    }

    impl NeighborSource for MemoryNeighbors {
        fn neighbor(&self, file: &Path, direction: Direction) -> Option<ScanResult> {
            let tag = match direction {
                Direction::Previous => "prev",
                Direction::Next => "next",
            };
            self.files.get(&(file.to_path_buf(), tag)).cloned()
        }
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 10, 28, 14, 0, 0).unwrap() + Duration::minutes(minute)
    }

    /// A lane of `len` lines where every line carries KEY; `marks` places
    /// start ("s"), end ("e") and hit ("h") markers. Line i is stamped at
    /// minute `base + i`.
    fn lane(file: &str, len: usize, base: i64, marks: &[(usize, &str)]) -> ScanResult {
        let lines = (0..len).map(|i| {
            let mut raw = format!("line {} {}", i, KEY);
            for (pos, kind) in marks {
                if *pos == i {
                    raw.push(' ');
                    raw.push_str(match *kind {
                        "s" => START,
                        "e" => END,
                        _ => ID,
                    });
                }
            }
            Ok(LogLine {
                index: i,
                raw,
                timestamp: Some(at(base + i as i64)),
            })
        });

        let matcher = IdMatcher::literal(ID).unwrap();
        AnchorScanner::new(START, END)
            .scan(Path::new(file), lines, KEY, &matcher)
            .unwrap()
    }

    fn indices(window: &Window) -> Vec<String> {
        window
            .lines
            .iter()
            .map(|l| l.raw.split_whitespace().nth(1).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_episode_inside_one_file() {
        let local = lane("f.0001", 20, 0, &[(2, "s"), (5, "s"), (8, "h"), (9, "h"), (12, "e"), (15, "e")]);

        let window = resolve_window(local, None, &MemoryNeighbors::default()).unwrap();

        let expected: Vec<String> = (5..=12).map(|i| i.to_string()).collect();
        assert_eq!(indices(&window), expected);
        assert_eq!(window.start, Some(at(5)));
        assert_eq!(window.end, Some(at(12)));
        assert_eq!(window.start_boundary, Boundary::Local);
        assert_eq!(window.end_boundary, Boundary::Local);
        assert_eq!(window.files, vec![PathBuf::from("f.0001")]);
    }

    #[test]
    fn test_end_marker_on_hit_line_counts() {
        let local = lane("f.0001", 10, 0, &[(1, "s"), (4, "h"), (4, "e")]);

        let window = resolve_window(local, None, &MemoryNeighbors::default()).unwrap();

        assert_eq!(window.lines.len(), 4);
        assert_eq!(window.end, Some(at(4)));
    }

    #[test]
    fn test_end_in_next_file() {
        // start@10, hit@55, no end before EOF; next file ends at 3
        let local = lane("log.0041", 61, 0, &[(10, "s"), (55, "h")]);
        let next = lane("log.0042", 10, 100, &[(3, "e"), (7, "e")]);
        let neighbors = MemoryNeighbors::default().with("log.0041", Direction::Next, next);

        let window = resolve_window(local, None, &neighbors).unwrap();

        assert_eq!(window.lines.len(), (61 - 10) + 4);
        assert_eq!(window.lines.first().unwrap().raw, format!("line 10 {} {}", KEY, START));
        assert_eq!(window.lines.last().unwrap().raw, format!("line 3 {} {}", KEY, END));
        assert_eq!(window.start, Some(at(10)));
        assert_eq!(window.end, Some(at(103)));
        assert_eq!(window.end_boundary, Boundary::Neighbor);
        assert_eq!(
            window.files,
            vec![PathBuf::from("log.0041"), PathBuf::from("log.0042")]
        );
    }

    #[test]
    fn test_start_in_previous_file() {
        let prev = lane("log.0040", 30, 0, &[(4, "s"), (9, "e"), (22, "s")]);
        let local = lane("log.0041", 20, 50, &[(3, "h"), (6, "e"), (11, "s")]);
        let neighbors = MemoryNeighbors::default().with("log.0041", Direction::Previous, prev);

        let window = resolve_window(local, None, &neighbors).unwrap();

        // previous file from its last start (22) to EOF, then 0..=6 locally
        assert_eq!(window.lines.len(), (30 - 22) + 7);
        assert_eq!(window.lines[0].raw, format!("line 22 {} {}", KEY, START));
        assert_eq!(window.start, Some(at(22)));
        assert_eq!(window.end, Some(at(56)));
        assert_eq!(window.start_boundary, Boundary::Neighbor);
        assert_eq!(
            window.files,
            vec![PathBuf::from("log.0040"), PathBuf::from("log.0041")]
        );
    }

    #[test]
    fn test_only_later_starts_means_previous_file() {
        // the local start comes after the hit, so it cannot open this episode
        let prev = lane("log.0040", 5, 0, &[(1, "s")]);
        let local = lane("log.0041", 10, 20, &[(2, "h"), (3, "e"), (5, "s")]);
        let neighbors = MemoryNeighbors::default().with("log.0041", Direction::Previous, prev);

        let window = resolve_window(local, None, &neighbors).unwrap();

        assert_eq!(window.start_boundary, Boundary::Neighbor);
        assert_eq!(window.start, Some(at(1)));
    }

    #[test]
    fn test_both_sides_use_their_own_neighbor() {
        let prev = lane("log.0040", 6, 0, &[(2, "s")]);
        let local = lane("log.0041", 5, 10, &[(2, "h")]);
        let next = lane("log.0042", 6, 20, &[(1, "e")]);
        let neighbors = MemoryNeighbors::default()
            .with("log.0041", Direction::Previous, prev)
            .with("log.0041", Direction::Next, next);

        let window = resolve_window(local, None, &neighbors).unwrap();

        assert_eq!(window.lines.len(), 4 + 5 + 2);
        assert_eq!(window.start, Some(at(2)));
        assert_eq!(window.end, Some(at(21)));
        assert_eq!(window.files.len(), 3);
    }

    #[test]
    fn test_missing_neighbors_fall_back_to_corpus_edge() {
        let local = lane("log.0041", 8, 0, &[(3, "h")]);

        let window = resolve_window(local, None, &MemoryNeighbors::default()).unwrap();

        assert_eq!(window.lines.len(), 8);
        assert_eq!(window.start, None);
        assert_eq!(window.end, None);
        assert_eq!(window.start_boundary, Boundary::CorpusEdge);
        assert_eq!(window.end_boundary, Boundary::CorpusEdge);
    }

    #[test]
    fn test_neighbor_without_marker_contributes_everything() {
        let prev = lane("log.0040", 4, 0, &[]);
        let local = lane("log.0041", 5, 10, &[(1, "h"), (2, "e")]);
        let neighbors = MemoryNeighbors::default().with("log.0041", Direction::Previous, prev);

        let window = resolve_window(local, None, &neighbors).unwrap();

        assert_eq!(window.lines.len(), 4 + 3);
        assert_eq!(window.start, None);
        assert_eq!(window.start_boundary, Boundary::CorpusEdge);
    }

    #[test]
    fn test_marker_without_timestamp_leaves_side_unresolved() {
        let mut local = lane("f.0001", 6, 0, &[(1, "s"), (2, "h"), (4, "e")]);
        local.anchors.starts[0].timestamp = None;

        let window = resolve_window(local, None, &MemoryNeighbors::default()).unwrap();

        assert_eq!(window.lines.len(), 4);
        assert_eq!(window.start, None);
        assert_eq!(window.end, Some(at(4)));
    }

    #[test]
    fn test_focus_selects_one_of_several_episodes() {
        let marks = [(0, "s"), (2, "h"), (3, "e"), (5, "s"), (7, "h"), (8, "e")];

        let first = resolve_window(lane("f.0001", 10, 0, &marks), Some(2), &MemoryNeighbors::default()).unwrap();
        let second = resolve_window(lane("f.0001", 10, 0, &marks), Some(7), &MemoryNeighbors::default()).unwrap();

        assert_eq!(indices(&first), vec!["0", "1", "2", "3"]);
        assert_eq!(indices(&second), vec!["5", "6", "7", "8"]);
    }

    #[test]
    fn test_no_hits_resolves_nothing() {
        let local = lane("f.0001", 5, 0, &[(1, "s"), (3, "e")]);
        assert!(resolve_window(local, None, &MemoryNeighbors::default()).is_none());
    }
}
