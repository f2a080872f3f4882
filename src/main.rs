use clap::{Parser, Subcommand};
use msgtrace::cli::run::TraceArgs;
use msgtrace::config::resolve_config_path;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "msgtrace")]
#[command(about = "Trace a message through scanner and mail transfer logs", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct every log episode of one Message-ID
    Trace {
        /// Message-ID, or a fragment of it
        id: String,

        /// Directory holding the extracted log families
        #[arg(long)]
        root: Option<PathBuf>,

        /// Directory the report is written to
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "msgtrace=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Trace { id, root, output } => {
            let config_path = resolve_config_path(cli.config.as_deref());
            msgtrace::cli::run::run(config_path, TraceArgs { id, root, output }).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => {
                msgtrace::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
