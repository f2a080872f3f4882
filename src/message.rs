use crate::family::Family;
use crate::window::Window;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One candidate message: created by discovery, filled in by window
/// resolution (scanner log) or queue-ID fetch and chain merge (transfer log).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageAggregate {
    /// Sequence number, unique within one discovery run
    pub id: u64,
    pub family: Family,
    pub external_id: String,
    /// Process ID (scanner log) or queue ID (transfer log)
    pub secondary_key: Option<String>,
    /// File and line position of the identifier hit that created this aggregate
    pub anchor_file: PathBuf,
    pub anchor_line: usize,
    /// Files contributing lines, first use order, no duplicates
    pub source_files: Vec<PathBuf>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub lines: Vec<String>,
    /// Queue this aggregate's message was handed to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_key: Option<String>,
    /// Timestamp of the relay line that exposed `related_key`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_time: Option<DateTime<Utc>>,
    /// Secondary keys merged into this aggregate, in chain order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub merged_keys: Vec<String>,
    /// Scanner-internal message ID from the episode's end marker line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
}

impl MessageAggregate {
    pub fn new(
        id: u64,
        family: Family,
        external_id: String,
        secondary_key: Option<String>,
        anchor_file: PathBuf,
        anchor_line: usize,
    ) -> Self {
        Self {
            id,
            family,
            external_id,
            secondary_key,
            source_files: vec![anchor_file.clone()],
            anchor_file,
            anchor_line,
            window_start: None,
            window_end: None,
            lines: Vec::new(),
            related_key: None,
            relay_time: None,
            merged_keys: Vec::new(),
            internal_id: None,
        }
    }

    pub fn add_source_file(&mut self, path: &Path) {
        if !self.source_files.iter().any(|p| p == path) {
            self.source_files.push(path.to_path_buf());
        }
    }

    /// Take over a resolved episode window. Source files follow the window's
    /// line order, so a start borrowed from the previous file lists that file
    /// first.
    pub fn apply_window(&mut self, window: Window) {
        self.source_files.clear();
        for file in &window.files {
            self.add_source_file(file);
        }
        self.window_start = window.start;
        self.window_end = window.end;
        self.lines.extend(window.lines.into_iter().map(|line| line.raw));
    }

    /// Earliest timestamp among the window bounds, used to order output.
    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        match (self.window_start, self.window_end) {
            (Some(start), _) => Some(start),
            (None, end) => end,
        }
    }

    /// Block written to the bulk export: a `Message #<id>` header followed
    /// by the message's lines.
    pub fn export_block(&self) -> String {
        let mut block = format!("Message #{}\n", self.id);
        for line in &self.lines {
            block.push_str(line);
            block.push('\n');
        }
        block
    }
}
