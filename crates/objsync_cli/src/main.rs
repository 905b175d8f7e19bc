//! objsync CLI
//!
//! Command-line entry point for the mirror agent.
//!
//! # Commands
//!
//! - `run` - Run the scheduler loop in the foreground
//! - `sync` - Perform a single sync pass and exit
//! - `test` - Test configuration and connectivity
//!
//! # Exit codes
//!
//! 0 success, 1 sync failure, 2 configuration error, 3 connectivity
//! failure.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Object storage mirroring agent.
#[derive(Parser)]
#[command(name = "objsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(global = true, short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler loop in the foreground (Ctrl+C to stop)
    Run,

    /// Perform a one-time sync and exit
    Sync {
        /// Re-transfer every candidate, ignoring recorded state
        #[arg(short, long)]
        force: bool,
    },

    /// Test configuration and connectivity
    Test,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let agent_config = match config::AgentConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::from(2);
        }
    };

    let issues = agent_config.validate();
    if !issues.is_empty() {
        eprintln!("configuration errors:");
        for issue in issues {
            eprintln!("  - {issue}");
        }
        return ExitCode::from(2);
    }

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(agent_config.logging.level.clone())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let code = match cli.command {
        Commands::Run => commands::run::run(&agent_config),
        Commands::Sync { force } => commands::sync::run(&agent_config, force),
        Commands::Test => commands::test::run(&agent_config),
    };
    ExitCode::from(code)
}
