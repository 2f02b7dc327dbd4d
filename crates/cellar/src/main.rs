//! Cellar - SQLite-backed HTTP session service
//!
//! Main entry point for the Cellar CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod commands;

use cellar_config::LoggingSection;
use commands::{config, revoke, serve, sweep};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Cellar - SQLite-backed HTTP session service
#[derive(Parser)]
#[command(name = "cellar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// User config directory (default: ~/.config/cellar)
    #[arg(long, global = true, env = "CELLAR_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the session server
    Serve(serve::ServeArgs),

    /// Reclaim expired sessions once and exit
    Sweep(sweep::SweepArgs),

    /// Revoke a session by ID
    Revoke(revoke::RevokeArgs),

    /// Configuration inspection
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = commands::Context::load(cli.config_dir, cli.json, cli.verbose)?;
    let _guard = init_tracing(&ctx.loaded.config.logging(), ctx.verbose);

    for warning in &ctx.loaded.warnings {
        eprintln!("warning: {}", warning);
    }

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Sweep(args) => sweep::run(args, &ctx).await,
        Commands::Revoke(args) => revoke::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Console (human-readable) plus an optional rotating JSON file.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(logging: &LoggingSection, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let console_filter = if verbose {
        EnvFilter::new(
            "cellar=debug,cellar_session=debug,cellar_server=debug,cellar_config=debug,tower_http=debug,info",
        )
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = &logging.level;
            EnvFilter::new(format!(
                "cellar={level},cellar_session={level},cellar_server={level},warn"
            ))
        })
    };

    let (file_layer, guard) = if logging.file {
        let log_dir = logging
            .directory
            .clone()
            .or_else(|| cellar_config::xdg_config_dir().map(|d| d.join("logs")))
            .unwrap_or_else(|| PathBuf::from("logs"));
        let file_appender = tracing_appender::rolling::daily(&log_dir, "cellar.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new(
                "cellar=trace,cellar_session=trace,cellar_server=trace,cellar_config=trace,info",
            ));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}
