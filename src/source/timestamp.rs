use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("regex compilation failed: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("pattern missing 'ts' capture group")]
    MissingTsGroup,

    #[error("failed to parse timestamp '{value}' with format '{format}': {reason}")]
    Unparseable {
        value: String,
        format: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
enum LineClock {
    /// strptime format; `year` is prepended when the format carries none
    Strptime { format: String, year: Option<i32> },
    Iso8601,
    Epoch,
    EpochMs,
}

/// Pulls the leading timestamp out of a log line.
///
/// The pattern must contain a named capture group `ts`. Syslog-style formats
/// such as `%b %d %H:%M:%S` carry no year; those are completed with the
/// configured year, or the current one when none is configured.
#[derive(Debug, Clone)]
pub struct TimestampExtractor {
    pattern: Regex,
    clock: LineClock,
}

impl TimestampExtractor {
    pub fn new(pattern: &str, format: &str, year: Option<i32>) -> Result<Self, TimestampError> {
        let pattern = Regex::new(pattern)?;
        if pattern.capture_names().all(|name| name != Some("ts")) {
            return Err(TimestampError::MissingTsGroup);
        }

        let clock = match format {
            "iso8601" => LineClock::Iso8601,
            "epoch" => LineClock::Epoch,
            "epoch_ms" => LineClock::EpochMs,
            other => {
                let has_year = other.contains("%Y") || other.contains("%y") || other.contains("%G");
                let year = if has_year {
                    None
                } else {
                    Some(year.unwrap_or_else(|| Utc::now().year()))
                };
                LineClock::Strptime {
                    format: other.to_string(),
                    year,
                }
            }
        };

        Ok(Self { pattern, clock })
    }

    /// `Ok(None)` when the line has no timestamp field at all.
    pub fn extract(&self, line: &str) -> Result<Option<DateTime<Utc>>, TimestampError> {
        let Some(value) = self
            .pattern
            .captures(line)
            .and_then(|captures| captures.name("ts"))
            .map(|m| m.as_str())
        else {
            return Ok(None);
        };

        let parsed = match &self.clock {
            LineClock::Iso8601 => DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| unparseable(value, "iso8601", e))?,
            LineClock::Epoch => {
                let seconds: i64 = value.parse().map_err(|e| unparseable(value, "epoch", e))?;
                Utc.timestamp_opt(seconds, 0)
                    .single()
                    .ok_or_else(|| unparseable(value, "epoch", "timestamp out of range"))?
            }
            LineClock::EpochMs => {
                let millis: i64 = value
                    .parse()
                    .map_err(|e| unparseable(value, "epoch_ms", e))?;
                Utc.timestamp_millis_opt(millis)
                    .single()
                    .ok_or_else(|| unparseable(value, "epoch_ms", "timestamp out of range"))?
            }
            LineClock::Strptime { format, year } => parse_strptime(value, format, *year)?,
        };

        Ok(Some(parsed))
    }
}

fn parse_strptime(
    value: &str,
    format: &str,
    year: Option<i32>,
) -> Result<DateTime<Utc>, TimestampError> {
    let (value, format) = match year {
        Some(year) => (format!("{year} {value}"), format!("%Y {format}")),
        None => (value.to_string(), format.to_string()),
    };

    if format.contains("%z") || format.contains("%:z") {
        DateTime::parse_from_str(&value, &format)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| unparseable(&value, &format, e))
    } else {
        NaiveDateTime::parse_from_str(&value, &format)
            .map(|ndt| Utc.from_utc_datetime(&ndt))
            .map_err(|e| unparseable(&value, &format, e))
    }
}

fn unparseable(value: &str, format: &str, reason: impl std::fmt::Display) -> TimestampError {
    TimestampError::Unparseable {
        value: value.to_string(),
        format: format.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_log_timestamp() {
        let extractor = TimestampExtractor::new(
            r"^(?P<ts>\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2})",
            "%Y/%m/%d %H:%M:%S",
            None,
        )
        .unwrap();

        let ts = extractor
            .extract("2021/10/28 14:13:53 GMT+00:00 [1234:5678] Info: Accept connection")
            .unwrap()
            .unwrap();

        assert_eq!(ts.to_rfc3339(), "2021-10-28T14:13:53+00:00");
    }

    #[test]
    fn test_syslog_timestamp_gets_configured_year() {
        let extractor = TimestampExtractor::new(
            r"^(?P<ts>[A-Z][a-z]{2} +\d{1,2} \d{2}:\d{2}:\d{2})",
            "%b %d %H:%M:%S",
            Some(2021),
        )
        .unwrap();

        let ts = extractor
            .extract("Oct 28 14:13:53 mx postfix/cleanup[42]: 935162C03E: message-id=<a@b>")
            .unwrap()
            .unwrap();

        assert_eq!(ts.to_rfc3339(), "2021-10-28T14:13:53+00:00");
    }

    #[test]
    fn test_syslog_single_digit_day() {
        let extractor = TimestampExtractor::new(
            r"^(?P<ts>[A-Z][a-z]{2} +\d{1,2} \d{2}:\d{2}:\d{2})",
            "%b %e %H:%M:%S",
            Some(2021),
        )
        .unwrap();

        let ts = extractor
            .extract("Nov  3 09:00:01 mx postfix/qmgr[7]: removed")
            .unwrap()
            .unwrap();

        assert_eq!(ts.to_rfc3339(), "2021-11-03T09:00:01+00:00");
    }

    #[test]
    fn test_iso8601_with_offset() {
        let extractor = TimestampExtractor::new(
            r"^(?P<ts>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[+-]\d{2}:\d{2})",
            "iso8601",
            None,
        )
        .unwrap();

        let ts = extractor
            .extract("2025-12-04T02:42:11+05:30 some log message")
            .unwrap()
            .unwrap();

        assert_eq!(ts.to_rfc3339(), "2025-12-03T21:12:11+00:00");
    }

    #[test]
    fn test_epoch_milliseconds() {
        let extractor = TimestampExtractor::new(r"^(?P<ts>\d{13})", "epoch_ms", None).unwrap();

        let ts = extractor.extract("1733280131011 message").unwrap().unwrap();

        assert_eq!(ts.timestamp(), 1733280131);
        assert_eq!(ts.timestamp_subsec_millis(), 11);
    }

    #[test]
    fn test_no_match_returns_none() {
        let extractor =
            TimestampExtractor::new(r"^(?P<ts>\d{4}/\d{2}/\d{2})", "%Y/%m/%d", None).unwrap();

        assert!(extractor.extract("no timestamp here").unwrap().is_none());
    }

    #[test]
    fn test_missing_ts_group_error() {
        let result = TimestampExtractor::new(r"^\d{4}", "%Y", None);
        assert!(matches!(result, Err(TimestampError::MissingTsGroup)));
    }

    #[test]
    fn test_unparseable_timestamp() {
        let extractor = TimestampExtractor::new(
            r"^(?P<ts>\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2})",
            "%Y/%m/%d %H:%M:%S",
            None,
        )
        .unwrap();

        let result = extractor.extract("2021/13/45 99:99:99 broken");
        assert!(matches!(result, Err(TimestampError::Unparseable { .. })));
    }
}
