//! docforge CLI: the main entry point.
//!
//! Commands:
//! - `generate`: run one task against recorded provider replies
//! - `batch`:    run a manifest of tasks concurrently
//! - `inspect`:  judge a single captured reply
//! - `tiers`:    show the configured tier ladder
//! - `config`:   show, validate, or print default configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod store;

#[derive(Parser)]
#[command(
    name = "docforge",
    about = "docforge: adaptive artifact generation pipeline",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of ~/.docforge/config.toml
    #[arg(short, long, global = true, env = "DOCFORGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate (or modify) an artifact from recorded provider replies
    Generate(commands::generate::GenerateArgs),

    /// Run every task of a manifest, sharing one usage sink
    Batch {
        /// TOML manifest listing the tasks
        manifest: PathBuf,

        /// How many tasks may run at once
        #[arg(short = 'j', long, default_value_t = 4)]
        concurrency: usize,

        /// Directory artifacts are written to
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },

    /// Classify, extract and validate a captured reply
    Inspect(commands::inspect::InspectArgs),

    /// Show the tier ladder
    Tiers,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Check the configuration file
    Validate,
    /// Print the defaults as TOML
    Default,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Generate(args) => commands::generate::run(config_path, args).await?,
        Commands::Batch {
            manifest,
            concurrency,
            out,
        } => commands::batch::run(config_path, &manifest, concurrency, &out).await?,
        Commands::Inspect(args) => commands::inspect::run(config_path, args).await?,
        Commands::Tiers => commands::tiers::run(config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Default => commands::config_cmd::default().await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
    }

    Ok(())
}
