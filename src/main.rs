//! # Atrium - A Desktop UI Shell Core
//!
//! Hierarchical page routing with history, and a token-based theme engine
//! with animated switches and hot reload.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run the shell
//! cargo run
//!
//! # Start with a specific theme and debug logging
//! cargo run -- --theme Light -vv
//!
//! # Use a local config and theme directory
//! cargo run -- --config ./atrium.toml --themes-dir ./themes
//! ```

mod pages;
mod shell;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use atrium_core::Config;

use crate::shell::Shell;

/// Atrium - desktop UI shell core
#[derive(Parser, Debug)]
#[command(name = "atrium")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding theme JSON files
    #[arg(long, value_name = "DIR")]
    themes_dir: Option<PathBuf>,

    /// Theme to apply at startup
    #[arg(short, long, value_name = "NAME")]
    theme: Option<String>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Loads the config and applies command line overrides.
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::load(),
        };
        if let Some(dir) = &self.themes_dir {
            config.theme.themes_dir = dir.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over -v
    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(filter)
        .init();

    tracing::info!("Starting Atrium v{}", env!("CARGO_PKG_VERSION"));

    let config = args.config()?;
    let mut shell = Shell::new(config)?;
    shell.start(args.theme.as_deref());
    shell.run().await
}
