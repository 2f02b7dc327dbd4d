//! Revoke command - deletes a session by ID.

use anyhow::{Result, bail};
use clap::Args;
use serde_json::json;

use cellar_session::Error as StoreError;

use super::Context;

/// Arguments for the revoke command.
#[derive(Args, Debug)]
pub struct RevokeArgs {
    /// Session ID to revoke
    pub id: String,
}

/// Run the revoke command.
pub async fn run(args: RevokeArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;
    let result = store.delete_by_id(&args.id);
    store.close().await?;

    match result {
        Ok(()) => {
            if ctx.json_output {
                println!("{}", json!({ "revoked": args.id }));
            } else {
                println!("Revoked session {}", args.id);
            }
            Ok(())
        }
        Err(StoreError::NotFound(_)) => bail!("no session with ID {}", args.id),
        Err(e) => Err(e.into()),
    }
}
