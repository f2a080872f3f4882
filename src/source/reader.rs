use crate::source::timestamp::{TimestampError, TimestampExtractor};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read '{path}' at line {line}: {source}")]
    Read {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

impl ReaderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReaderError::Open { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// One line of a log file.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    /// 0-based position in the file the line came from
    pub index: usize,
    pub raw: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A log file on disk that can be read any number of times.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD instead of
/// failing the read, so a single corrupt line never hides the rest of a file.
#[derive(Debug, Clone)]
pub struct LineSource {
    path: PathBuf,
    timestamps: TimestampExtractor,
}

impl LineSource {
    pub fn new(path: impl Into<PathBuf>, timestamps: TimestampExtractor) -> Self {
        Self {
            path: path.into(),
            timestamps,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file and iterate its lines from the beginning.
    pub fn lines(&self) -> Result<Lines<'_>, ReaderError> {
        let file = File::open(&self.path).map_err(|source| ReaderError::Open {
            path: self.path.clone(),
            source,
        })?;

        Ok(Lines {
            source: self,
            reader: BufReader::new(file),
            buf: Vec::new(),
            next_index: 0,
            done: false,
        })
    }

    /// Read the whole file into memory.
    pub fn read_all(&self) -> Result<Vec<LogLine>, ReaderError> {
        self.lines()?.collect()
    }

    fn stamp(&self, raw: &str) -> Option<DateTime<Utc>> {
        match self.timestamps.extract(raw) {
            Ok(ts) => ts,
            Err(TimestampError::Unparseable { value, .. }) => {
                tracing::trace!(file = %self.path.display(), value = %value, "Unparseable line timestamp");
                None
            }
            Err(_) => None,
        }
    }
}

/// Iterator over the lines of a [`LineSource`]. The file is closed when the
/// iterator is dropped.
pub struct Lines<'a> {
    source: &'a LineSource,
    reader: BufReader<File>,
    buf: Vec<u8>,
    next_index: usize,
    done: bool,
}

impl Iterator for Lines<'_> {
    type Item = Result<LogLine, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                let decoded = String::from_utf8_lossy(&self.buf);
                let raw = decoded.trim_end_matches(&['\n', '\r'][..]).to_string();
                let index = self.next_index;
                self.next_index += 1;
                Some(Ok(LogLine {
                    index,
                    timestamp: self.source.stamp(&raw),
                    raw,
                }))
            }
            Err(source) => {
                self.done = true;
                Some(Err(ReaderError::Read {
                    path: self.source.path.clone(),
                    line: self.next_index,
                    source,
                }))
            }
        }
    }
}
