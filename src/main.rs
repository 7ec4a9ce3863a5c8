//! tunelink - a link-preview server for audio files.
//!
//! Given a relative path under the media root, tunelink resolves tags
//! and cover art (cached, deadline-bounded) and serves an OpenGraph
//! preview page for it. Run with no subcommand to start the server.

pub mod config;
pub mod cover;
pub mod db;
pub mod error;
pub mod index;
pub mod resolver;
pub mod server;
pub mod tags;
#[cfg(test)]
pub mod test_utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "tunelink", about = "Link-preview server for audio files", version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TUNELINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (the default)
    Serve,
    /// Scan the media root once and report the number of eligible files
    Scan,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("tunelink=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = config::Config::load(cli.config.as_deref());
    config.validate()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => server::serve(config).await,
        Commands::Scan => scan(&config),
    }
}

/// One-shot index scan, useful for smoke-testing a media root.
fn scan(config: &config::Config) -> anyhow::Result<()> {
    let index = index::FileIndex::new(
        &config.media.music_dir,
        &config.media.accepted_extensions,
    );
    let count = index.rescan_blocking()?;
    println!(
        "Found {} eligible files under {}",
        count,
        config.media.music_dir.display()
    );
    Ok(())
}
