use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory the family directories are resolved against
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub scanner: ScannerFamilyConfig,
    #[serde(default)]
    pub transfer: TransferFamilyConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            scanner: ScannerFamilyConfig::default(),
            transfer: TransferFamilyConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    pub fn scanner_dir(&self) -> PathBuf {
        self.root.join(&self.scanner.dir)
    }

    pub fn transfer_dir(&self) -> PathBuf {
        self.root.join(&self.transfer.dir)
    }
}

/// Content-scanning engine log: process-id lanes, rotated into numbered files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerFamilyConfig {
    pub dir: PathBuf,
    pub prefix: String,
    /// Width of the zero-padded rotation number at the end of each file name
    pub sequence_width: usize,
    pub timestamp: TimestampConfig,
    pub identifier: Option<IdentifierConfig>,
    /// Token holding the process ID on every line
    pub key_field: TokenField,
    /// Token holding the engine's internal message ID on the end marker line
    pub internal_id_field: Option<TokenField>,
    pub markers: MarkerConfig,
}

impl Default for ScannerFamilyConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("IMSVA/LogFile/Event3"),
            prefix: "log.imss".to_string(),
            sequence_width: 4,
            timestamp: TimestampConfig {
                pattern: r"^(?P<ts>\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2})".to_string(),
                format: "%Y/%m/%d %H:%M:%S".to_string(),
                year: None,
            },
            identifier: None,
            key_field: TokenField {
                token: 3,
                trim: String::new(),
            },
            internal_id_field: Some(TokenField {
                token: 7,
                trim: ",".to_string(),
            }),
            markers: MarkerConfig {
                start: "Info: Accept connection from client [127.0.0.1]".to_string(),
                end: "Scan finished for".to_string(),
            },
        }
    }
}

/// Mail-transfer-agent log: queue-ID keyed lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferFamilyConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub timestamp: TimestampConfig,
    pub identifier: Option<IdentifierConfig>,
    /// Token holding the queue ID
    pub key_field: TokenField,
    pub relay: RelayConfig,
}

impl Default for TransferFamilyConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("IMSVA/Logfile/Event5"),
            prefix: "maillog".to_string(),
            timestamp: TimestampConfig {
                pattern: r"^(?P<ts>[A-Z][a-z]{2} +\d{1,2} \d{2}:\d{2}:\d{2})".to_string(),
                format: "%b %e %H:%M:%S".to_string(),
                year: None,
            },
            identifier: Some(IdentifierConfig {
                prefix: "message-id=<".to_string(),
                suffix: ">".to_string(),
            }),
            key_field: TokenField {
                token: 5,
                trim: ":".to_string(),
            },
            relay: RelayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampConfig {
    pub pattern: String,
    pub format: String,
    /// Year assumed for formats that carry none (syslog)
    #[serde(default)]
    pub year: Option<i32>,
}

/// Delimiters wrapped around the identifier in a family's anchor lines,
/// e.g. `message-id=<` and `>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierConfig {
    pub prefix: String,
    pub suffix: String,
}

/// A whitespace-separated token position, with characters stripped from both
/// ends of the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenField {
    pub token: usize,
    #[serde(default)]
    pub trim: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Literal present on delivery lines that may hand the message to a new queue
    pub marker: String,
    /// Literal preceding the new queue ID inside the trailing parenthetical
    pub requeue: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            marker: "status=sent".to_string(),
            requeue: "queued as".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("msgtrace-out"),
        }
    }
}
