use crate::merge::MergeOutcome;
use crate::message::MessageAggregate;
use crate::window::Boundary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const REPORT_FILE: &str = "trace.json";
pub const EXPORT_FILE: &str = "trace.txt";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// A scanner aggregate together with how its window was bounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerEntry {
    #[serde(flatten)]
    pub message: MessageAggregate,
    /// `None` when no window could be resolved
    pub start_boundary: Option<Boundary>,
    pub end_boundary: Option<Boundary>,
}

impl ScannerEntry {
    pub fn unresolved(message: MessageAggregate) -> Self {
        Self {
            message,
            start_boundary: None,
            end_boundary: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TraceReport {
    pub external_id: String,
    pub generated_at: DateTime<Utc>,
    pub scanner: Vec<ScannerEntry>,
    pub transfer: Vec<MessageAggregate>,
    pub violations: Vec<String>,
}

impl TraceReport {
    pub fn new(external_id: &str, mut scanner: Vec<ScannerEntry>, merged: MergeOutcome) -> Self {
        scanner.sort_by(|a, b| {
            let (a, b) = (&a.message, &b.message);
            let (a_seen, b_seen) = (a.first_seen(), b.first_seen());
            (a_seen.is_none(), a_seen, a.id).cmp(&(b_seen.is_none(), b_seen, b.id))
        });

        Self {
            external_id: external_id.to_string(),
            generated_at: Utc::now(),
            scanner,
            transfer: merged.messages,
            violations: merged.violations.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn message_count(&self) -> usize {
        self.scanner.len() + self.transfer.len()
    }

    /// Every message's lines, scanner episodes first, each block headed by
    /// `Message #<id>`.
    pub fn bulk_export(&self) -> String {
        self.scanner
            .iter()
            .map(|entry| &entry.message)
            .chain(self.transfer.iter())
            .map(MessageAggregate::export_block)
            .collect()
    }

    /// Write the JSON report and the bulk export into `dir`, creating it.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
        fs::create_dir_all(dir).map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let json_path = dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self)?;
        write_file(&json_path, &json)?;

        let text_path = dir.join(EXPORT_FILE);
        write_file(&text_path, &self.bulk_export())?;

        info!(
            dir = %dir.display(),
            messages = self.message_count(),
            violations = self.violations.len(),
            "Wrote trace report"
        );
        Ok(vec![json_path, text_path])
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    fs::write(path, contents).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
