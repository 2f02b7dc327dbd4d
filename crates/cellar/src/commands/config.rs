//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use cellar_config::{CellarConfig, ResolvedSecret};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration with secrets redacted
    Show,

    /// Show which config files are loaded and their precedence
    Which,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.loaded.config;
    let effective = CellarConfig {
        session: Some(config.session()),
        server: Some(config.server()),
        logging: Some(config.logging()),
    }
    .redacted();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    println!("# Cellar Configuration\n");

    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    println!("Secrets:");
    println!(
        "  secret_key   {}",
        secret_status(config.session().resolve_secret_key())
    );
    println!(
        "  admin_token  {}",
        secret_status(config.server().resolve_admin_token())
    );
    println!();

    print!("{}", effective.to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config files (lowest precedence first):");
    for source in &ctx.loaded.sources {
        let status = if source.loaded { "loaded" } else { "not found" };
        println!("  {} ({})", source.path.display(), status);
    }
    Ok(())
}

fn secret_status(secret: Option<ResolvedSecret>) -> String {
    match secret {
        Some(s) => format!("set via {}", s.source),
        None => "not set".to_string(),
    }
}
