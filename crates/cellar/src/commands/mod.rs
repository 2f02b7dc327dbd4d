//! CLI command handlers.

pub mod config;
pub mod revoke;
pub mod serve;
pub mod sweep;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use cellar_config::LoadedConfig;
use cellar_session::SessionStore;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration and where it came from.
    pub loaded: LoadedConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Discover and merge config layers.
    pub fn load(config_dir: Option<PathBuf>, json_output: bool, verbose: bool) -> Result<Self> {
        let loaded = cellar_config::load_config_with_options(None, config_dir.as_deref())
            .context("failed to load configuration")?;
        Ok(Self {
            loaded,
            json_output,
            verbose,
        })
    }

    /// Open the session store described by the `[session]` section.
    pub async fn open_store(&self) -> Result<SessionStore> {
        let section = self.loaded.config.session();
        SessionStore::open(section.to_store_config())
            .await
            .with_context(|| {
                format!(
                    "failed to open session store at {}",
                    section.storage_location.display()
                )
            })
    }
}
