//! Per-family line layouts.
//!
//! Each log family exposes the same three facts about a line (external ID,
//! secondary key, timestamp) through [`LineFormat`]; token positions and
//! literals come from configuration so format drift stays in one place.

pub mod identifier;
pub mod scanner;
pub mod transfer;

use crate::config::types::{IdentifierConfig, TokenField};
use crate::source::timestamp::{TimestampError, TimestampExtractor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use identifier::IdMatcher;
pub use scanner::ScannerFormat;
pub use transfer::TransferFormat;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("timestamp config error: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("identifier pattern error: {0}")]
    IdentifierPattern(#[from] regex::Error),

    #[error("identifier cannot be empty")]
    EmptyIdentifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Scanner,
    Transfer,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Scanner => f.write_str("scanner"),
            Family::Transfer => f.write_str("transfer"),
        }
    }
}

pub trait LineFormat: Send + Sync {
    fn family(&self) -> Family;

    /// Literal prefix shared by every file of the family
    fn file_prefix(&self) -> &str;

    fn timestamps(&self) -> &TimestampExtractor;

    fn identifier(&self) -> Option<&IdentifierConfig>;

    fn key_field(&self) -> &TokenField;

    fn timestamp(&self, line: &str) -> Result<Option<DateTime<Utc>>, TimestampError> {
        self.timestamps().extract(line)
    }

    fn secondary_key<'a>(&self, line: &'a str) -> Option<&'a str> {
        token_at(line, self.key_field())
    }

    /// Build the matcher used to recognise `query` in this family's lines.
    fn id_matcher(&self, query: &str) -> Result<IdMatcher, FormatError> {
        match self.identifier() {
            Some(delims) => IdMatcher::bounded(query, &delims.prefix, &delims.suffix),
            None => IdMatcher::literal(query),
        }
    }

    fn external_id(&self, line: &str, matcher: &IdMatcher) -> Option<String> {
        matcher.find(line).map(str::to_string)
    }
}

/// Whitespace-separated token at `field.token`, with `field.trim` characters
/// stripped from both ends. Empty tokens count as absent.
pub fn token_at<'a>(line: &'a str, field: &TokenField) -> Option<&'a str> {
    line.split_whitespace()
        .nth(field.token)
        .map(|token| token.trim_matches(|c| field.trim.contains(c)))
        .filter(|token| !token.is_empty())
}
