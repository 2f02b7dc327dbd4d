//! Server configuration.

use std::net::SocketAddr;

use cellar_config::ServerSection;

use crate::error::Result;

/// Default max body size for REST requests (64 KB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Bearer token for admin routes. `None` leaves them open (localhost mode).
    pub admin_token: Option<String>,

    /// Enable HTTP request tracing.
    pub request_logging: bool,

    /// Maximum REST request body size in bytes.
    pub max_body_size: usize,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_address", &self.bind_address)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("request_logging", &self.request_logging)
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            admin_token: None,
            request_logging: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with an optional admin token.
    /// Pass `None` to disable admin authentication (localhost mode).
    pub fn new(admin_token: Option<String>) -> Self {
        Self {
            admin_token,
            ..Default::default()
        }
    }

    /// Build from the `[server]` config section, resolving the admin token
    /// from the environment first.
    pub fn from_section(section: &ServerSection) -> Result<Self> {
        Ok(Self {
            bind_address: section.bind_addr()?,
            admin_token: section.resolve_admin_token().map(|t| t.value),
            request_logging: section.request_logging,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        })
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Set the maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }
}
