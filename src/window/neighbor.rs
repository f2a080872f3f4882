use crate::anchor::{AnchorScanner, ScanResult};
use crate::family::{IdMatcher, LineFormat, ScannerFormat};
use crate::source::reader::LineSource;
use crate::source::rotation::{Direction, RotatedName};
use std::path::Path;
use tracing::{info, warn};

/// Access to the lane scans of files adjacent to the one being resolved.
///
/// `None` means the neighbor does not exist (or cannot be read); the resolver
/// then treats the edge of the available corpus as the episode boundary.
pub trait NeighborSource {
    fn neighbor(&self, file: &Path, direction: Direction) -> Option<ScanResult>;
}

/// Looks up rotation neighbors on disk by stepping the file name's numeric
/// suffix and scanning the result for the same lane.
pub struct RotatedNeighbors<'a> {
    format: &'a ScannerFormat,
    scanner: &'a AnchorScanner,
    key: &'a str,
    matcher: &'a IdMatcher,
}

impl<'a> RotatedNeighbors<'a> {
    pub fn new(
        format: &'a ScannerFormat,
        scanner: &'a AnchorScanner,
        key: &'a str,
        matcher: &'a IdMatcher,
    ) -> Self {
        Self {
            format,
            scanner,
            key,
            matcher,
        }
    }
}

impl NeighborSource for RotatedNeighbors<'_> {
    fn neighbor(&self, file: &Path, direction: Direction) -> Option<ScanResult> {
        let name = file.file_name()?.to_str()?;
        let Some(rotated) = RotatedName::parse(name, self.format.sequence_width()) else {
            warn!(file = %file.display(), "File name has no rotation number, cannot look at neighbors");
            return None;
        };
        let Some(adjacent) = rotated.step(direction) else {
            info!(file = %file.display(), direction = %direction, "No neighbor in rotation sequence");
            return None;
        };

        let path = file.with_file_name(adjacent.to_string());
        let source = LineSource::new(&path, self.format.timestamps().clone());
        info!(
            file = %file.display(),
            neighbor = %path.display(),
            direction = %direction,
            "Episode crosses file boundary, checking neighbor"
        );

        match self.scanner.scan_file(&source, self.key, self.matcher) {
            Ok(scan) => Some(scan),
            Err(e) if e.is_not_found() => {
                warn!(neighbor = %path.display(), "Neighbor file missing, corpus edge is the boundary");
                None
            }
            Err(e) => {
                warn!(neighbor = %path.display(), error = %e, "Neighbor file unreadable, corpus edge is the boundary");
                None
            }
        }
    }
}
