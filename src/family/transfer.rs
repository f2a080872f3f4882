use super::{Family, FormatError, LineFormat};
use crate::config::types::{IdentifierConfig, RelayConfig, TokenField, TransferFamilyConfig};
use crate::source::timestamp::TimestampExtractor;

/// Mail transfer agent (Postfix) log lines:
///
/// ```text
/// Oct 28 14:13:53 mx postfix/cleanup[4242]: 935162C03E: message-id=<...>
/// Oct 28 14:13:54 mx postfix/smtp[4250]: 935162C03E: to=<...>, status=sent (250 2.0.0 Ok: queued as D89812C044)
/// ```
#[derive(Debug, Clone)]
pub struct TransferFormat {
    prefix: String,
    timestamps: TimestampExtractor,
    identifier: Option<IdentifierConfig>,
    key_field: TokenField,
    relay: RelayConfig,
}

impl TransferFormat {
    pub fn from_config(config: &TransferFamilyConfig) -> Result<Self, FormatError> {
        let timestamps = TimestampExtractor::new(
            &config.timestamp.pattern,
            &config.timestamp.format,
            config.timestamp.year,
        )?;

        Ok(Self {
            prefix: config.prefix.clone(),
            timestamps,
            identifier: config.identifier.clone(),
            key_field: config.key_field.clone(),
            relay: config.relay.clone(),
        })
    }

    /// The queue a relay line hands the message to, when it differs from
    /// `own_key`. Only the trailing parenthetical of the line is considered.
    pub fn requeue_key(&self, line: &str, own_key: &str) -> Option<String> {
        if !line.contains(&self.relay.marker) {
            return None;
        }

        let inner = line.trim_end().strip_suffix(')')?;
        let open = inner.rfind('(')?;
        let parenthetical = &inner[open + 1..];

        let at = parenthetical.find(&self.relay.requeue)?;
        let key = parenthetical[at + self.relay.requeue.len()..]
            .split_whitespace()
            .next()?;

        (key != own_key).then(|| key.to_string())
    }
}

impl LineFormat for TransferFormat {
    fn family(&self) -> Family {
        Family::Transfer
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

    const RELAY: &str = "Oct 28 14:13:54 mx postfix/smtp[4250]: 935162C03E: to=<joel@example.com>, \
                         relay=127.0.0.1[127.0.0.1]:10025, status=sent (250 2.0.0 Ok: queued as D89812C044)";

    fn format() -> TransferFormat {
        TransferFormat::from_config(&TransferFamilyConfig::default()).unwrap()
    }

    #[test]
    fn test_queue_id_token() {
        assert_eq!(format().secondary_key(RELAY), Some("935162C03E"));
    }

    #[test]
    fn test_requeue_key_from_trailing_parenthetical() {
        assert_eq!(
            format().requeue_key(RELAY, "935162C03E").as_deref(),
            Some("D89812C044")
        );
    }

    #[test]
    fn test_requeue_to_self_is_ignored() {
        assert_eq!(format().requeue_key(RELAY, "D89812C044"), None);
    }

    #[test]
    fn test_deferred_line_is_not_a_relay() {
        let line = "Oct 28 14:13:54 mx postfix/smtp[4250]: 935162C03E: to=<a@b>, \
                    status=deferred (connect to mx: queued as nothing)";
        assert_eq!(format().requeue_key(line, "935162C03E"), None);
    }

    #[test]
    fn test_sent_without_queue_is_not_a_relay() {
        let line = "Oct 28 14:13:54 mx postfix/local[4251]: D89812C044: to=<a@b>, \
                    status=sent (delivered to mailbox)";
        assert_eq!(format().requeue_key(line, "D89812C044"), None);
    }

    #[test]
    fn test_message_id_extraction() {
        let format = format();
        let matcher = format.id_matcher("A12EBDE048@mx2").unwrap();
        let line = "Oct 28 14:13:53 mx postfix/cleanup[4242]: 935162C03E: \
                    message-id=<20211028141353.A12EBDE048@mx2.sat.gob.mx>";
        assert_eq!(
            format.external_id(line, &matcher).as_deref(),
            Some("20211028141353.A12EBDE048@mx2.sat.gob.mx")
        );
    }
}
