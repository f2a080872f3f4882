use crate::config::parse::{load_config, ConfigError};
use crate::config::types::Config;
use crate::discovery::continue_ids;
use crate::report::{ReportError, TraceReport};
use crate::trace::{TraceError, Tracer};
use futures::future::try_join_all;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::spawn_blocking;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("report error: {0}")]
    Report(#[from] ReportError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Default)]
pub struct TraceArgs {
    pub id: String,
    pub root: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

pub async fn run(
    config_path: Option<PathBuf>,
    args: TraceArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(&path).map_err(RunError::from)?
        }
        None => {
            info!("No config file found, using built-in defaults");
            Config::default()
        }
    };

    let report = run_trace(config, args).await?;
    println!(
        "{} message(s) for {}: {} scanner, {} transfer",
        report.message_count(),
        report.external_id,
        report.scanner.len(),
        report.transfer.len()
    );
    for violation in &report.violations {
        eprintln!("Warning: {}", violation);
    }
    Ok(())
}

/// Trace one identifier and write the report to the output directory.
pub async fn run_trace(mut config: Config, args: TraceArgs) -> Result<TraceReport, RunError> {
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(output) = args.output {
        config.output.dir = output;
    }
    let query = args.id;

    let tracer = Arc::new(Tracer::new(&config)?);
    let matcher = tracer.scanner_matcher(&query)?;

    info!(id = %query, root = %config.root.display(), "Tracing message");

    // Both families are independent until the end
    let scanner_task = {
        let tracer = Arc::clone(&tracer);
        let query = query.clone();
        spawn_blocking(move || tracer.discover_scanner(&query))
    };
    let transfer_task = {
        let tracer = Arc::clone(&tracer);
        let query = query.clone();
        spawn_blocking(move || tracer.discover_transfer(&query))
    };
    let (scanner, transfer) = tokio::try_join!(scanner_task, transfer_task)?;
    let scanner = scanner?;
    let mut transfer = transfer?;
    continue_ids(&scanner, &mut transfer);

    // each family has already warned on its own
    if scanner.is_empty() && transfer.is_empty() {
        info!(id = %query, "Nothing to resolve, writing empty report");
    }

    let resolving = scanner.into_iter().map(|message| {
        let tracer = Arc::clone(&tracer);
        let matcher = matcher.clone();
        spawn_blocking(move || tracer.resolve_scanner(message, &matcher))
    });
    let entries = try_join_all(resolving).await?;

    let merged = {
        let tracer = Arc::clone(&tracer);
        spawn_blocking(move || tracer.merge_transfer(transfer)).await?
    };

    let report = TraceReport::new(&query, entries, merged);
    report.write_to(&config.output.dir)?;
    Ok(report)
}
