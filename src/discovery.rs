use crate::family::{FormatError, LineFormat, TransferFormat};
use crate::message::MessageAggregate;
use crate::source::reader::LineSource;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to list log directory '{path}': {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid identifier: {0}")]
    Format(#[from] FormatError),
}

/// Files in `dir` whose name starts with `prefix`, sorted by name.
pub fn family_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DiscoveryError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Scan every file of one family for `query` and append one aggregate per
/// hit line to `acc`.
///
/// Aggregate IDs continue after the highest ID already in `acc`. A family in
/// which the identifier never occurs yields no aggregates and a single
/// warning; files that cannot be read are skipped with a warning of their
/// own. Only an unreadable family directory or an empty query is fatal.
pub fn discover(
    dir: &Path,
    format: &dyn LineFormat,
    query: &str,
    mut acc: Vec<MessageAggregate>,
) -> Result<Vec<MessageAggregate>, DiscoveryError> {
    let matcher = format.id_matcher(query)?;
    let family = format.family();
    let files = family_files(dir, format.file_prefix())?;

    let mut next_id = acc.iter().map(|m| m.id).max().map_or(1, |id| id + 1);
    let before = acc.len();

    for path in &files {
        let source = LineSource::new(path, format.timestamps().clone());
        let lines = match source.lines() {
            Ok(lines) => lines,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable log file");
                continue;
            }
        };

        let mut hits = 0usize;
        for line in lines {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Stopped reading log file early");
                    break;
                }
            };
            if !matcher.is_match(&line.raw) {
                continue;
            }

            let external_id = format
                .external_id(&line.raw, &matcher)
                .unwrap_or_else(|| matcher.query().to_string());
            let secondary_key = format.secondary_key(&line.raw).map(str::to_string);
            if secondary_key.is_none() {
                warn!(
                    file = %path.display(),
                    position = line.index,
                    family = %family,
                    "Identifier hit has no secondary key token"
                );
            }

            acc.push(MessageAggregate::new(
                next_id,
                family,
                external_id,
                secondary_key,
                path.clone(),
                line.index,
            ));
            next_id += 1;
            hits += 1;
        }

        debug!(file = %path.display(), family = %family, hits, "Scanned for identifier");
    }

    let found = acc.len() - before;
    if found == 0 {
        warn!(family = %family, id = %query, files = files.len(), "Identifier not found in any file of family");
    } else {
        info!(family = %family, id = %query, found, "Discovered identifier hits");
    }

    Ok(acc)
}

/// Renumber `batch` so its IDs continue after the highest ID in `acc`, for
/// families discovered independently of each other.
pub fn continue_ids(acc: &[MessageAggregate], batch: &mut [MessageAggregate]) {
    let mut next_id = acc.iter().map(|m| m.id).max().map_or(1, |id| id + 1);
    batch.sort_by_key(|m| m.id);
    for aggregate in batch.iter_mut() {
        aggregate.id = next_id;
        next_id += 1;
    }
}

/// One fetched line, with the timestamp used to order it.
struct QueueLine {
    at: Option<DateTime<Utc>>,
    file: usize,
    raw: String,
}

/// Fill each transfer aggregate with every line logged under its queue ID,
/// across all files of the family.
///
/// A line belongs to a queue when its key token equals the queue ID, so relay
/// lines naming the next queue stay with the queue that logged them. Lines
/// are ordered by timestamp, not by file name, since rotated names do not
/// sort chronologically (`maillog` is newer than `maillog.1`). A line without
/// a timestamp keeps the one of the line before it in the same file. Window
/// bounds become the earliest and latest line timestamps.
pub fn fetch_queue_lines(
    dir: &Path,
    format: &TransferFormat,
    aggregates: &mut [MessageAggregate],
) -> Result<(), DiscoveryError> {
    let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for (slot, aggregate) in aggregates.iter().enumerate() {
        if let Some(key) = &aggregate.secondary_key {
            by_key.entry(key.clone()).or_default().push(slot);
        }
    }
    if by_key.is_empty() {
        return Ok(());
    }

    let files = family_files(dir, format.file_prefix())?;
    let mut fetched: Vec<Vec<QueueLine>> = aggregates.iter().map(|_| Vec::new()).collect();

    for (file, path) in files.iter().enumerate() {
        let source = LineSource::new(path, format.timestamps().clone());
        let lines = match source.lines() {
            Ok(lines) => lines,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable log file");
                continue;
            }
        };

        let mut last_seen = None;
        for line in lines {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Stopped reading log file early");
                    break;
                }
            };
            if line.timestamp.is_some() {
                last_seen = line.timestamp;
            }
            let Some(slots) = format.secondary_key(&line.raw).and_then(|key| by_key.get(key)) else {
                continue;
            };

            for &slot in slots {
                fetched[slot].push(QueueLine {
                    at: last_seen,
                    file,
                    raw: line.raw.clone(),
                });
            }
        }
    }

    for (aggregate, mut lines) in aggregates.iter_mut().zip(fetched) {
        // stable: lines of one file keep their order on equal timestamps
        lines.sort_by_key(|line| line.at);

        if !lines.is_empty() {
            aggregate.source_files.clear();
        }
        for line in lines {
            aggregate.add_source_file(&files[line.file]);
            if let Some(ts) = line.at {
                aggregate.window_start = Some(aggregate.window_start.map_or(ts, |s| s.min(ts)));
                aggregate.window_end = Some(aggregate.window_end.map_or(ts, |e| e.max(ts)));
            }
            aggregate.lines.push(line.raw);
        }

        debug!(
            id = aggregate.id,
            key = aggregate.secondary_key.as_deref().unwrap_or("-"),
            lines = aggregate.lines.len(),
            "Fetched queue lines"
        );
    }

    Ok(())
}
