use crate::family::IdMatcher;
use crate::source::reader::{LineSource, LogLine, ReaderError};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A recognised line: its timestamp and its position in the filtered lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub timestamp: Option<DateTime<Utc>>,
    pub index: usize,
}

/// Start, end and identifier-hit anchors of one scan, each ascending by
/// position. Indices point into [`ScanResult::lines`], not the raw file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorSet {
    pub starts: Vec<Anchor>,
    pub ends: Vec<Anchor>,
    pub hits: Vec<Anchor>,
}

/// The lines of one file that belong to a single secondary key, with anchors.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub file: PathBuf,
    pub lines: Vec<LogLine>,
    pub anchors: AnchorSet,
}

impl ScanResult {
    pub fn key_found(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Filtered position of the line that sat at `file_line` in the raw file.
    pub fn position_of(&self, file_line: usize) -> Option<usize> {
        self.lines
            .binary_search_by_key(&file_line, |line| line.index)
            .ok()
    }
}

/// Single-pass scanner for episode markers and identifier hits on one lane.
#[derive(Debug, Clone)]
pub struct AnchorScanner {
    start_marker: String,
    end_marker: String,
}

impl AnchorScanner {
    pub fn new(start_marker: impl Into<String>, end_marker: impl Into<String>) -> Self {
        Self {
            start_marker: start_marker.into(),
            end_marker: end_marker.into(),
        }
    }

    /// Keep the lines containing `key` and record anchors over them.
    ///
    /// A key that never occurs is not an error: the result is empty and a
    /// warning is logged so the caller can move on to the next file.
    pub fn scan<I>(
        &self,
        file: &Path,
        lines: I,
        key: &str,
        matcher: &IdMatcher,
    ) -> Result<ScanResult, ReaderError>
    where
        I: IntoIterator<Item = Result<LogLine, ReaderError>>,
    {
        let mut kept = Vec::new();
        let mut anchors = AnchorSet::default();

        for line in lines {
            let line = line?;
            if !line.raw.contains(key) {
                continue;
            }

            let anchor = Anchor {
                timestamp: line.timestamp,
                index: kept.len(),
            };
            if line.raw.contains(&self.start_marker) {
                anchors.starts.push(anchor);
            }
            if line.raw.contains(&self.end_marker) {
                anchors.ends.push(anchor);
            }
            if matcher.is_match(&line.raw) {
                anchors.hits.push(anchor);
            }
            kept.push(line);
        }

        if kept.is_empty() {
            warn!(file = %file.display(), key = %key, "Secondary key not found in file");
        } else {
            debug!(
                file = %file.display(),
                key = %key,
                lines = kept.len(),
                starts = anchors.starts.len(),
                ends = anchors.ends.len(),
                hits = anchors.hits.len(),
                "Scanned lane"
            );
        }

        Ok(ScanResult {
            file: file.to_path_buf(),
            lines: kept,
            anchors,
        })
    }

    pub fn scan_file(
        &self,
        source: &LineSource,
        key: &str,
        matcher: &IdMatcher,
    ) -> Result<ScanResult, ReaderError> {
        self.scan(source.path(), source.lines()?, key, matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PID: &str = "[2714:3060]";

    fn line(index: usize, raw: &str) -> Result<LogLine, ReaderError> {
        Ok(LogLine {
            index,
            raw: raw.to_string(),
            timestamp: None,
        })
    }

    fn scanner() -> AnchorScanner {
        AnchorScanner::new("Accept connection", "Scan finished")
    }

    fn sample() -> Vec<Result<LogLine, ReaderError>> {
        vec![
            line(0, "t [2714:3060] Accept connection"),
            line(1, "t [9999:1111] Accept connection"),
            line(2, "t [2714:3060] Message-ID: <abc@host>"),
            line(3, "t [9999:1111] Message-ID: <zzz@host>"),
            line(4, "t [2714:3060] Scan finished for X1, ok"),
        ]
    }

    #[test]
    fn test_filters_by_key_and_indexes_filtered_lines() {
        let matcher = IdMatcher::literal("abc@host").unwrap();
        let result = scanner()
            .scan(Path::new("log.imss.20211028.0001"), sample(), PID, &matcher)
            .unwrap();

        assert_eq!(result.lines.len(), 3);
        assert_eq!(result.lines[1].index, 2);
        assert_eq!(result.anchors.starts[0].index, 0);
        assert_eq!(result.anchors.hits[0].index, 1);
        assert_eq!(result.anchors.ends[0].index, 2);
        assert_eq!(result.position_of(4), Some(2));
        assert_eq!(result.position_of(3), None);
    }

    #[test]
    fn test_rescan_of_filtered_lines_is_identical() {
        let matcher = IdMatcher::literal("abc@host").unwrap();
        let file = Path::new("log.imss.20211028.0001");
        let first = scanner().scan(file, sample(), PID, &matcher).unwrap();
        let second = scanner()
            .scan(file, first.lines.clone().into_iter().map(Ok), PID, &matcher)
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_key_is_empty_not_error() {
        let matcher = IdMatcher::literal("abc@host").unwrap();
        let result = scanner()
            .scan(Path::new("f"), sample(), "[0000:0000]", &matcher)
            .unwrap();

        assert!(!result.key_found());
        assert_eq!(result.anchors, AnchorSet::default());
    }

    #[test]
    fn test_read_error_propagates() {
        let matcher = IdMatcher::literal("abc@host").unwrap();
        let lines = vec![
            line(0, "t [2714:3060] Accept connection"),
            Err(ReaderError::Read {
                path: PathBuf::from("f"),
                line: 1,
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk"),
            }),
        ];

        assert!(scanner().scan(Path::new("f"), lines, PID, &matcher).is_err());
    }
}
