use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, unexpanded_env_vars};
use regex::Regex;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string)
}

/// Parse, expand and validate a YAML config document.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let unexpanded = unexpanded_env_vars(yaml_string);
    if unexpanded.is_empty() {
        return Ok(());
    }

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}\n\
         \n\
         To fix this, either:\n\
         1. Set the environment variables (e.g., export CDT_ROOT=/cases/CDT-20211028-121205)\n\
         2. Replace the variables in the config file with actual paths",
        unexpanded.join(", ")
    )))
}

fn expand_paths(config: &mut Config) {
    config.root = expand_tilde(&config.root);
    config.output.dir = expand_tilde(&config.output.dir);
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_scanner(&config.scanner, &mut errors);
    validate_transfer(&config.transfer, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_scanner(scanner: &ScannerFamilyConfig, errors: &mut Vec<String>) {
    let prefix = "scanner";

    if scanner.prefix.is_empty() {
        errors.push(format!("{}: file prefix cannot be empty", prefix));
    }
    if scanner.sequence_width == 0 {
        errors.push(format!("{}: sequence_width must be at least 1", prefix));
    }
    if scanner.markers.start.is_empty() || scanner.markers.end.is_empty() {
        errors.push(format!("{}: start and end markers cannot be empty", prefix));
    } else if scanner.markers.start == scanner.markers.end {
        errors.push(format!(
            "{}: start and end markers must differ (both are '{}')",
            prefix, scanner.markers.start
        ));
    }

    validate_timestamp(prefix, &scanner.timestamp, errors);
    validate_identifier(prefix, scanner.identifier.as_ref(), errors);
}

fn validate_transfer(transfer: &TransferFamilyConfig, errors: &mut Vec<String>) {
    let prefix = "transfer";

    if transfer.prefix.is_empty() {
        errors.push(format!("{}: file prefix cannot be empty", prefix));
    }
    if transfer.relay.marker.is_empty() || transfer.relay.requeue.is_empty() {
        errors.push(format!(
            "{}: relay marker and requeue literal cannot be empty",
            prefix
        ));
    }

    validate_timestamp(prefix, &transfer.timestamp, errors);
    validate_identifier(prefix, transfer.identifier.as_ref(), errors);
}

fn validate_timestamp(context: &str, timestamp: &TimestampConfig, errors: &mut Vec<String>) {
    match Regex::new(&timestamp.pattern) {
        Ok(re) => {
            if re.capture_names().all(|name| name != Some("ts")) {
                errors.push(format!(
                    "{}: timestamp pattern must contain named capture group 'ts': {}",
                    context, timestamp.pattern
                ));
            }
        }
        Err(e) => {
            errors.push(format!(
                "{}: invalid timestamp pattern regex: {} (error: {})",
                context, timestamp.pattern, e
            ));
        }
    }

    if timestamp.format.is_empty() {
        errors.push(format!("{}: timestamp format cannot be empty", context));
    }
}

fn validate_identifier(
    context: &str,
    identifier: Option<&IdentifierConfig>,
    errors: &mut Vec<String>,
) {
    if let Some(identifier) = identifier {
        if identifier.prefix.is_empty() || identifier.suffix.is_empty() {
            errors.push(format!(
                "{}: identifier prefix and suffix must both be set when identifier is configured",
                context
            ));
        }
    }
}
