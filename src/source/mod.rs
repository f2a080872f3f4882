pub mod reader;
pub mod rotation;
pub mod timestamp;

pub use reader::{LineSource, LogLine, ReaderError};
pub use rotation::{Direction, RotatedName};
pub use timestamp::{TimestampError, TimestampExtractor};
