//! Sweep command - reclaims expired sessions once.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::Context;

/// Arguments for the sweep command.
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Report the number of stored sessions after the sweep
    #[arg(long)]
    pub count: bool,
}

/// Sweep result for JSON output.
#[derive(Debug, Serialize)]
struct SweepOutput {
    scanned: usize,
    reclaimed: usize,
    skipped: usize,
    failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<usize>,
}

/// Run the sweep command.
pub async fn run(args: SweepArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;

    let Some(report) = store.sweep_now()? else {
        store.close().await?;
        bail!("a sweep is already in progress");
    };
    let remaining = if args.count {
        Some(store.session_count()?)
    } else {
        None
    };
    store.close().await?;

    if ctx.json_output {
        let output = SweepOutput {
            scanned: report.scanned,
            reclaimed: report.reclaimed,
            skipped: report.skipped,
            failed: report.failed,
            remaining,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Sweep complete").bold());
    println!("  {} {}", dim.apply_to("Scanned:  "), report.scanned);
    println!("  {} {}", dim.apply_to("Reclaimed:"), style(report.reclaimed).cyan());
    println!("  {} {}", dim.apply_to("Skipped:  "), report.skipped);
    if report.failed > 0 {
        println!("  {} {}", dim.apply_to("Failed:   "), style(report.failed).red());
    }
    if let Some(remaining) = remaining {
        println!("  {} {}", dim.apply_to("Remaining:"), remaining);
    }
    Ok(())
}
