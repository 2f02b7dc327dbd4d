//! Application state shared across handlers.

use std::sync::Arc;

use cellar_session::SessionStore;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Application state shared across all handlers.
///
/// Holds the one store instance for the process; handlers never open their
/// own.
#[derive(Clone)]
pub struct AppState {
    /// The session store.
    pub store: Arc<SessionStore>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(store: SessionStore, config: ServerConfig) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }

    /// The session store.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Close the store once no other handle to it remains.
    pub async fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.store) {
            Ok(store) => store.close().await.map_err(ServerError::from),
            Err(_) => {
                warn!("Session store still in use at shutdown, leaving it open");
                Ok(())
            }
        }
    }
}
