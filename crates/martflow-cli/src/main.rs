mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

#[derive(Parser)]
#[command(
    name = "martflow",
    version,
    about = "Report runs, reader cache, and destination secrets for martflow"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine config file
    #[arg(short, long, default_value = "martflow.yaml", global = true)]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the engine config and open the state store
    Check,
    /// Show the last run of every report, or of one report
    Status {
        /// Only this report
        #[arg(long)]
        report: Option<String>,
    },
    /// List reader cache entries
    Cache {
        /// Only entries that have already expired
        #[arg(long)]
        expired: bool,
    },
    /// Replace a destination's managed secret key
    RotateSecret {
        /// Destination id
        destination: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Check => commands::check::execute(&cli.config),
        Commands::Status { report } => commands::status::execute(&cli.config, report.as_deref()),
        Commands::Cache { expired } => commands::cache::execute(&cli.config, expired),
        Commands::RotateSecret { destination } => {
            commands::secret::execute(&cli.config, &destination).await
        }
    }
}
