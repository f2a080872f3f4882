use crate::anchor::AnchorScanner;
use crate::config::types::Config;
use crate::discovery::{self, DiscoveryError};
use crate::family::{FormatError, IdMatcher, LineFormat, ScannerFormat, TransferFormat};
use crate::merge::{ChainMerger, MergeOutcome};
use crate::message::MessageAggregate;
use crate::report::{ScannerEntry, TraceReport};
use crate::source::reader::LineSource;
use crate::window::{resolve_window, Boundary, RotatedNeighbors};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("log format error: {0}")]
    Format(#[from] FormatError),

    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

/// Traces one external identifier through both log families.
///
/// Every step is blocking; the CLI drives them from a runtime, [`Tracer::trace`]
/// runs them in sequence.
#[derive(Debug)]
pub struct Tracer {
    scanner_dir: PathBuf,
    transfer_dir: PathBuf,
    scanner: ScannerFormat,
    transfer: TransferFormat,
    anchors: AnchorScanner,
}

impl Tracer {
    pub fn new(config: &Config) -> Result<Self, TraceError> {
        let scanner = ScannerFormat::from_config(&config.scanner)?;
        let transfer = TransferFormat::from_config(&config.transfer)?;
        let markers = scanner.markers();
        let anchors = AnchorScanner::new(&markers.start, &markers.end);

        Ok(Self {
            scanner_dir: config.scanner_dir(),
            transfer_dir: config.transfer_dir(),
            scanner,
            transfer,
            anchors,
        })
    }

    /// Matcher for `query` in scanner lines; fails on an empty identifier.
    pub fn scanner_matcher(&self, query: &str) -> Result<IdMatcher, TraceError> {
        Ok(self.scanner.id_matcher(query)?)
    }

    pub fn discover_scanner(&self, query: &str) -> Result<Vec<MessageAggregate>, TraceError> {
        info!(dir = %self.scanner_dir.display(), "Searching scanner log");
        Ok(discovery::discover(
            &self.scanner_dir,
            &self.scanner,
            query,
            Vec::new(),
        )?)
    }

    /// Discover transfer aggregates and fill them with their queue lines.
    pub fn discover_transfer(&self, query: &str) -> Result<Vec<MessageAggregate>, TraceError> {
        info!(dir = %self.transfer_dir.display(), "Searching transfer log");
        let mut found = discovery::discover(&self.transfer_dir, &self.transfer, query, Vec::new())?;
        discovery::fetch_queue_lines(&self.transfer_dir, &self.transfer, &mut found)?;
        Ok(found)
    }

    /// Resolve the episode window of one scanner aggregate.
    ///
    /// Problems reading the lane leave the aggregate without a window; they
    /// never fail the trace.
    pub fn resolve_scanner(&self, mut message: MessageAggregate, matcher: &IdMatcher) -> ScannerEntry {
        let Some(key) = message.secondary_key.clone() else {
            warn!(id = message.id, "Scanner hit without process ID, window left unresolved");
            return ScannerEntry::unresolved(message);
        };

        let source = LineSource::new(&message.anchor_file, self.scanner.timestamps().clone());
        let local = match self.anchors.scan_file(&source, &key, matcher) {
            Ok(local) => local,
            Err(e) => {
                warn!(id = message.id, error = %e, "Cannot rescan anchor file, window left unresolved");
                return ScannerEntry::unresolved(message);
            }
        };

        let neighbors = RotatedNeighbors::new(&self.scanner, &self.anchors, &key, matcher);
        let Some(window) = resolve_window(local, Some(message.anchor_line), &neighbors) else {
            return ScannerEntry::unresolved(message);
        };

        if window.end_boundary != Boundary::CorpusEdge {
            message.internal_id = window
                .lines
                .last()
                .and_then(|line| self.scanner.internal_id(&line.raw));
        }
        let (start_boundary, end_boundary) = (window.start_boundary, window.end_boundary);
        message.apply_window(window);

        info!(
            id = message.id,
            key = %key,
            lines = message.lines.len(),
            internal_id = message.internal_id.as_deref().unwrap_or("-"),
            "Resolved scanner episode"
        );

        ScannerEntry {
            message,
            start_boundary: Some(start_boundary),
            end_boundary: Some(end_boundary),
        }
    }

    pub fn merge_transfer(&self, messages: Vec<MessageAggregate>) -> MergeOutcome {
        ChainMerger::new(&self.transfer).merge(messages)
    }

    /// Run every step in order on the current thread.
    pub fn trace(&self, query: &str) -> Result<TraceReport, TraceError> {
        let matcher = self.scanner_matcher(query)?;
        let scanner = self.discover_scanner(query)?;
        let mut transfer = self.discover_transfer(query)?;
        discovery::continue_ids(&scanner, &mut transfer);

        let entries = scanner
            .into_iter()
            .map(|message| self.resolve_scanner(message, &matcher))
            .collect();
        let merged = self.merge_transfer(transfer);

        Ok(TraceReport::new(query, entries, merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &std::path::Path) -> Config {
        Config {
            root: root.to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn test_missing_family_directory_fails() {
        let dir = TempDir::new().unwrap();
        let tracer = Tracer::new(&config(dir.path())).unwrap();
        assert!(matches!(
            tracer.trace("abc@host"),
            Err(TraceError::Discovery(DiscoveryError::Directory { .. }))
        ));
    }

    #[test]
    fn test_empty_identifier_fails() {
        let dir = TempDir::new().unwrap();
        let tracer = Tracer::new(&config(dir.path())).unwrap();
        assert!(matches!(tracer.trace(""), Err(TraceError::Format(_))));
    }

    #[test]
    fn test_unresolved_without_process_id() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        fs::create_dir_all(cfg.scanner_dir()).unwrap();
        fs::write(
            cfg.scanner_dir().join("log.imss.20211028.0001"),
            "2021/10/28 14:00:00 abc@host\n",
        )
        .unwrap();

        let tracer = Tracer::new(&cfg).unwrap();
        let found = tracer.discover_scanner("abc@host").unwrap();
        let matcher = tracer.scanner_matcher("abc@host").unwrap();
        let entry = tracer.resolve_scanner(found[0].clone(), &matcher);

        assert!(entry.message.lines.is_empty());
        assert_eq!(entry.start_boundary, None);
    }
}
