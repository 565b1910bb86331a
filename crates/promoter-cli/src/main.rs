//! Promoter CLI - compare, copy and split secrets between environments.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::compare::CompareArgs;
use commands::copy::CopyArgs;
use commands::split::SplitArgs;

#[derive(Parser)]
#[command(name = "promoter")]
#[command(about = "Compare, copy and split secrets between environments")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to <config dir>/promoter/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how two documents differ, with sensitive values hidden
    Compare(CompareArgs),

    /// Merge keys from one document into another
    Copy(CopyArgs),

    /// Move sensitive keys out of a document into a new one
    Split(SplitArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.unwrap_or_else(commands::default_config_path);

    let result: Result<(), anyhow::Error> = match cli.command {
        Commands::Compare(args) => commands::compare::run(&config, args).await,
        Commands::Copy(args) => commands::copy::run(&config, args).await,
        Commands::Split(args) => commands::split::run(&config, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
