//! Retrolaunch - run emulator cores headlessly
//!
//! # Commands
//!
//! - `retrolaunch run` - Launch a core with content and collect its outputs
//! - `retrolaunch config-path` - Print where the configuration file lives
//! - `retrolaunch config-init` - Write a default configuration file
//!
//! # Usage
//!
//! ```bash
//! # Run a NES game for ten seconds, then save a screenshot and a state
//! retrolaunch run --core fceumm game.nes --duration 10 \
//!     --screenshot-out shot.png --state-out game.state
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use retrolaunch::config;
use retrolaunch::run::{self, RunArgs};

/// Retrolaunch - run emulator cores headlessly
#[derive(Parser)]
#[command(name = "retrolaunch")]
#[command(about = "Run sandboxed emulator cores headlessly")]
#[command(version)]
struct Cli {
    /// Read configuration from this file instead of the platform default
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a core and collect its outputs
    Run(RunArgs),

    /// Print the configuration file location
    ConfigPath,

    /// Write a configuration file with every default spelled out
    ConfigInit {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let config = match &cli.config {
                Some(path) => config::load_from(path)?,
                None => config::load()?,
            };
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(run::execute(&args, &config))
        }
        Commands::ConfigPath => {
            let path = cli
                .config
                .or_else(config::config_path)
                .context("No configuration directory on this platform")?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::ConfigInit { force } => {
            let path = cli
                .config
                .or_else(config::config_path)
                .context("No configuration directory on this platform")?;
            if config::init(&path, force)? {
                println!("Wrote {}", path.display());
            } else {
                println!("{} already exists; pass --force to replace it", path.display());
            }
            Ok(())
        }
    }
}
