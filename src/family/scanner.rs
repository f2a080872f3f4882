use super::{token_at, Family, FormatError, LineFormat};
use crate::config::types::{IdentifierConfig, MarkerConfig, ScannerFamilyConfig, TokenField};
use crate::source::timestamp::TimestampExtractor;

/// Content-scanning engine log lines:
///
/// ```text
/// 2021/10/28 14:13:53 GMT+00:00 [2714:3060] Info: Accept connection from client [127.0.0.1]
/// 2021/10/28 14:13:55 GMT+00:00 [2714:3060] Scan finished for 7A3C1F02-..., action=deliver
/// ```
///
/// Every line of one scan carries the same process ID token; an episode runs
/// from the start marker to the end marker on that lane.
#[derive(Debug, Clone)]
pub struct ScannerFormat {
    prefix: String,
    sequence_width: usize,
    timestamps: TimestampExtractor,
    identifier: Option<IdentifierConfig>,
    key_field: TokenField,
    internal_id_field: Option<TokenField>,
    markers: MarkerConfig,
}

impl ScannerFormat {
    pub fn from_config(config: &ScannerFamilyConfig) -> Result<Self, FormatError> {
        let timestamps = TimestampExtractor::new(
            &config.timestamp.pattern,
            &config.timestamp.format,
            config.timestamp.year,
        )?;

        Ok(Self {
            prefix: config.prefix.clone(),
            sequence_width: config.sequence_width,
            timestamps,
            identifier: config.identifier.clone(),
            key_field: config.key_field.clone(),
            internal_id_field: config.internal_id_field.clone(),
            markers: config.markers.clone(),
        })
    }

    pub fn sequence_width(&self) -> usize {
        self.sequence_width
    }

    pub fn markers(&self) -> &MarkerConfig {
        &self.markers
    }

    /// The engine's internal message ID, read from an end marker line.
    pub fn internal_id(&self, line: &str) -> Option<String> {
        if !line.contains(&self.markers.end) {
            return None;
        }
        let field = self.internal_id_field.as_ref()?;
        token_at(line, field).map(str::to_string)
    }
}

impl LineFormat for ScannerFormat {
    fn family(&self) -> Family {
        Family::Scanner
    }

    fn file_prefix(&self) -> &str {
        &self.prefix
    }

    fn timestamps(&self) -> &TimestampExtractor {
        &self.timestamps
    }

    fn identifier(&self) -> Option<&IdentifierConfig> {
        self.identifier.as_ref()
    }

    fn key_field(&self) -> &TokenField {
        &self.key_field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> ScannerFormat {
        ScannerFormat::from_config(&ScannerFamilyConfig::default()).unwrap()
    }

    #[test]
    fn test_process_id_token() {
        let line = "2021/10/28 14:13:53 GMT+00:00 [2714:3060] Info: Accept connection from client [127.0.0.1]";
        assert_eq!(format().secondary_key(line), Some("[2714:3060]"));
    }

    #[test]
    fn test_internal_id_from_end_marker() {
        let line = "2021/10/28 14:13:55 GMT+00:00 [2714:3060] Scan finished for 7A3C1F02-29B5-5805-A6C9-1D3C29A1E0B4, action=deliver";
        assert_eq!(
            format().internal_id(line).as_deref(),
            Some("7A3C1F02-29B5-5805-A6C9-1D3C29A1E0B4")
        );
    }

    #[test]
    fn test_internal_id_ignores_other_lines() {
        let line = "2021/10/28 14:13:54 GMT+00:00 [2714:3060] Debug: rule matched for 7A3C1F02, x";
        assert_eq!(format().internal_id(line), None);
    }

    #[test]
    fn test_literal_identifier_by_default() {
        let format = format();
        let matcher = format.id_matcher("20211028141353.A12EBDE048@mx2.sat.gob.mx").unwrap();
        let line = "2021/10/28 14:13:54 GMT+00:00 [2714:3060] Info: Message-ID: <20211028141353.A12EBDE048@mx2.sat.gob.mx>";
        assert_eq!(
            format.external_id(line, &matcher).as_deref(),
            Some("20211028141353.A12EBDE048@mx2.sat.gob.mx")
        );
    }
}
