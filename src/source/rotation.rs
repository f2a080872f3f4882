use std::fmt;

/// Which neighbor of a rotated file to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Previous => f.write_str("previous"),
            Direction::Next => f.write_str("next"),
        }
    }
}

/// A file name ending in a fixed-width, zero-padded rotation sequence number,
/// e.g. `log.imss.20211028.0043`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedName {
    prefix: String,
    sequence: u64,
    width: usize,
}

impl RotatedName {
    /// Split `file_name` into its literal prefix and trailing `width`-digit
    /// sequence number. Returns `None` when the name has no such suffix.
    pub fn parse(file_name: &str, width: usize) -> Option<Self> {
        if width == 0 || file_name.len() <= width {
            return None;
        }

        let split = file_name.len() - width;
        if !file_name.is_char_boundary(split) {
            return None;
        }
        let (prefix, digits) = file_name.split_at(split);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            prefix: prefix.to_string(),
            sequence: digits.parse().ok()?,
            width,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The adjacent name in `direction`. `None` below zero or once the
    /// sequence no longer fits in the suffix width.
    pub fn step(&self, direction: Direction) -> Option<Self> {
        let sequence = match direction {
            Direction::Previous => self.sequence.checked_sub(1)?,
            Direction::Next => self.sequence.checked_add(1)?,
        };
        if sequence.to_string().len() > self.width {
            return None;
        }

        Some(Self {
            prefix: self.prefix.clone(),
            sequence,
            width: self.width,
        })
    }
}

impl fmt::Display for RotatedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:0width$}", self.prefix, self.sequence, width = self.width)
    }
}
