use std::path::PathBuf;

use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(
    name = "studentsync",
    about = "Reconcile student enrollment into Google Workspace accounts",
    version
)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "studentsync.toml")]
    config: String,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Reconcile students into the directory
    Sync {
        /// `full`, `limited` (state-reported schools only), or a school number
        mode: String,
        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,
    },
    /// Write a default configuration file
    Init {
        /// Where to write the configuration
        #[arg(long, default_value = "studentsync.toml")]
        path: String,
    },
    /// Validate configuration and show the resolved OU layout
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::logging::init(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Sync { mode, dry_run } => {
            commands::sync::run(&cli.config, &mode, dry_run).await?;
        }
        Commands::Init { path } => {
            commands::init::run(&path).await?;
        }
        Commands::Check => {
            commands::check::run(&cli.config).await?;
        }
    }

    Ok(())
}
