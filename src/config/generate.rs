pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# MSGTRACE CONFIGURATION
# =============================================================================
# Describes where the two log families live inside an extracted support
# bundle and how their lines are laid out. Every section is optional; the
# values below are the built-in defaults.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/msgtrace/config.yml
#   3. /etc/msgtrace/config.yml
#
# $env{VAR} references are expanded before parsing, and a leading ~ in paths
# expands to the home directory.

# Directory the family directories below are resolved against.
# Overridden by `msgtrace trace --root <DIR>`.
root: .

# =============================================================================
# SCANNER LOG (content-scanning engine, process-id lanes)
# =============================================================================

scanner:
  dir: IMSVA/LogFile/Event3
  # Files are named <prefix>.<date>.<sequence>, e.g. log.imss.20211028.0043
  prefix: log.imss
  # Width of the zero-padded rotation number at the end of each file name
  sequence_width: 4
  timestamp:
    # Regex must contain a named capture group 'ts'
    pattern: '^(?P<ts>\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2})'
    # strptime format string, 'iso8601', 'epoch', or 'epoch_ms'
    format: '%Y/%m/%d %H:%M:%S'
  # Whitespace-separated token (0-based) holding the process ID
  key_field:
    token: 3
  # Token holding the engine's internal message ID on the end marker line
  internal_id_field:
    token: 7
    trim: ','
  # Literal markers emitted once per scan at entry and completion
  markers:
    start: 'Info: Accept connection from client [127.0.0.1]'
    end: 'Scan finished for'
  # Uncomment to match the identifier only inside delimiters; the full
  # delimited value then becomes the message's external ID.
  # identifier:
  #   prefix: '<'
  #   suffix: '>'

# =============================================================================
# TRANSFER LOG (mail transfer agent, queue-ID keyed)
# =============================================================================

transfer:
  dir: IMSVA/Logfile/Event5
  # maillog, maillog.1, maillog-20211028, ...
  prefix: maillog
  timestamp:
    pattern: '^(?P<ts>[A-Z][a-z]{2} +\d{1,2} \d{2}:\d{2}:\d{2})'
    format: '%b %e %H:%M:%S'
    # Syslog timestamps carry no year; defaults to the current year
    # year: 2021
  identifier:
    prefix: 'message-id=<'
    suffix: '>'
  # Token holding the queue ID, e.g. "935162C03E:"
  key_field:
    token: 5
    trim: ':'
  # Delivery lines like "status=sent (250 2.0.0 Ok: queued as D89812C044)"
  # hand the message to a new queue; those queues are merged into one message.
  relay:
    marker: 'status=sent'
    requeue: 'queued as'

# =============================================================================
# OUTPUT
# =============================================================================

output:
  # trace.json and trace.txt are written here
  dir: msgtrace-out
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::parse_config;
    use crate::config::types::Config;

    #[test]
    fn test_starter_config_matches_defaults() {
        let parsed = parse_config(&generate_starter_config()).unwrap();
        let defaults = Config::default();

        assert_eq!(parsed.scanner.prefix, defaults.scanner.prefix);
        assert_eq!(parsed.scanner.markers.start, defaults.scanner.markers.start);
        assert_eq!(parsed.scanner.timestamp.pattern, defaults.scanner.timestamp.pattern);
        assert_eq!(parsed.transfer.timestamp.format, defaults.transfer.timestamp.format);
        assert_eq!(parsed.transfer.relay.requeue, defaults.transfer.relay.requeue);
        assert_eq!(parsed.output.dir, defaults.output.dir);
    }
}
