use super::FormatError;
use regex::Regex;

/// Recognises an external identifier inside a log line.
#[derive(Debug, Clone)]
pub enum IdMatcher {
    /// Exact substring
    Literal(String),
    /// `<prefix>…fragment…<suffix>`; the whole delimited value is the match
    Bounded { fragment: String, pattern: Regex },
}

impl IdMatcher {
    pub fn literal(id: &str) -> Result<Self, FormatError> {
        if id.is_empty() {
            return Err(FormatError::EmptyIdentifier);
        }
        Ok(IdMatcher::Literal(id.to_string()))
    }

    pub fn bounded(fragment: &str, prefix: &str, suffix: &str) -> Result<Self, FormatError> {
        if fragment.is_empty() {
            return Err(FormatError::EmptyIdentifier);
        }

        // The delimited value may not run past the first suffix character.
        let stop = suffix
            .chars()
            .next()
            .map(|c| regex::escape(&c.to_string()))
            .unwrap_or_default();
        let body = format!(r"[^{stop}\s]*");
        let pattern = Regex::new(&format!(
            "{}(?P<id>{body}{}{body}){}",
            regex::escape(prefix),
            regex::escape(fragment),
            regex::escape(suffix),
        ))?;

        Ok(IdMatcher::Bounded {
            fragment: fragment.to_string(),
            pattern,
        })
    }

    /// The identifier text as supplied by the caller.
    pub fn query(&self) -> &str {
        match self {
            IdMatcher::Literal(id) => id,
            IdMatcher::Bounded { fragment, .. } => fragment,
        }
    }

    pub fn is_match(&self, line: &str) -> bool {
        match self {
            IdMatcher::Literal(id) => line.contains(id.as_str()),
            IdMatcher::Bounded { pattern, .. } => pattern.is_match(line),
        }
    }

    /// The matched identifier within `line`.
    pub fn find<'a>(&self, line: &'a str) -> Option<&'a str> {
        match self {
            IdMatcher::Literal(id) => line
                .find(id.as_str())
                .map(|start| &line[start..start + id.len()]),
            IdMatcher::Bounded { pattern, .. } => pattern
                .captures(line)
                .and_then(|caps| caps.name("id"))
                .map(|m| m.as_str()),
        }
    }
}
