//! Serve command - runs the session HTTP server.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Args;
use tracing::info;

use cellar_server::{Server, ServerConfig};
use cellar_session::short_id;

use super::Context;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides `server.bind`)
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Disable per-request tracing
    #[arg(long)]
    pub no_request_logging: bool,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let mut config = ServerConfig::from_section(&ctx.loaded.config.server())?;
    if let Some(bind) = args.bind {
        config = config.with_bind_address(bind);
    }
    if args.no_request_logging {
        config = config.with_request_logging(false);
    }
    if config.admin_token.is_none() {
        info!("No admin token configured, admin routes are unauthenticated");
    }

    let store = ctx.open_store().await?;
    store.set_pre_delete_callback(|session| {
        info!(
            session = session.id().map(short_id).unwrap_or_default(),
            keys = session.values().len(),
            "Reclaiming expired session"
        );
    });

    for source in ctx.loaded.loaded_from() {
        info!(path = %source.display(), "Loaded config");
    }

    Server::new(store, config).run().await?;
    Ok(())
}
