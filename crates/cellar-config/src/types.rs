//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [session]                # cookie policy, lifetime, storage
//! [server]                 # HTTP host settings
//! [logging]                # log level and file output
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use cellar_session::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_COOKIE_NAME, DEFAULT_COOKIE_PATH, DEFAULT_MAX_AGE,
    DEFAULT_STORAGE_LOCATION, SameSite, StoreConfig,
};
use serde::{Deserialize, Serialize};

use crate::secrets::{ADMIN_TOKEN_ENV, ResolvedSecret, SECRET_KEY_ENV, resolve_secret};
use crate::{ConfigError, Result};

/// Placeholder printed in place of secrets.
const REDACTED: &str = "<redacted>";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellarConfig {
    /// Session store configuration.
    pub session: Option<SessionSection>,

    /// Server configuration.
    pub server: Option<ServerSection>,

    /// Logging configuration.
    pub logging: Option<LoggingSection>,
}

impl CellarConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: CellarConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }

        if other.server.is_some() {
            self.server = other.server;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// The `[session]` section, or defaults.
    pub fn session(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    /// The `[server]` section, or defaults.
    pub fn server(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    /// The `[logging]` section, or defaults.
    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }

    /// A copy with every secret replaced by a placeholder, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(ref mut session) = config.session
            && session.secret_key.is_some()
        {
            session.secret_key = Some(REDACTED.to_string());
        }
        if let Some(ref mut server) = config.server
            && server.admin_token.is_some()
        {
            server.admin_token = Some(REDACTED.to_string());
        }
        config
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// `SameSite` policy as written in config files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        }
    }
}

/// Session store configuration section.
///
/// ```toml
/// [session]
/// cookie_name = "session-id"
/// secure = true
/// max_age_secs = 3600
/// storage_location = "/var/lib/cellar/sessions.sqlite"
/// cleanup_interval_secs = 300
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Name of the session cookie.
    pub cookie_name: String,
    /// Cookie `Path` attribute.
    pub path: String,
    /// Cookie `Domain` attribute.
    pub domain: Option<String>,
    /// Cookie `HttpOnly` attribute.
    pub http_only: bool,
    /// Cookie `Secure` attribute.
    pub secure: bool,
    /// Cookie `SameSite` attribute.
    pub same_site: SameSitePolicy,
    /// Session lifetime in seconds.
    pub max_age_secs: u64,
    /// SQLite database file.
    pub storage_location: PathBuf,
    /// Signing secret. Prefer the `CELLAR_SECRET_KEY` environment variable.
    pub secret_key: Option<String>,
    /// Run on the built-in insecure key when no secret is set. Development only.
    pub allow_insecure_default_key: bool,
    /// Seconds between reclaimer sweeps.
    pub cleanup_interval_secs: u64,
    /// Persist new sessions that hold no values.
    pub persist_empty_sessions: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            path: DEFAULT_COOKIE_PATH.to_string(),
            domain: None,
            http_only: true,
            secure: false,
            same_site: SameSitePolicy::Lax,
            max_age_secs: DEFAULT_MAX_AGE.as_secs(),
            storage_location: PathBuf::from(DEFAULT_STORAGE_LOCATION),
            secret_key: None,
            allow_insecure_default_key: false,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL.as_secs(),
            persist_empty_sessions: false,
        }
    }
}

impl SessionSection {
    /// Resolve the signing secret from the environment or this section.
    pub fn resolve_secret_key(&self) -> Option<ResolvedSecret> {
        resolve_secret(SECRET_KEY_ENV, self.secret_key.as_deref())
    }

    /// Whether the section carries the secret in plaintext.
    pub fn has_plaintext_secret(&self) -> bool {
        self.secret_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Build the store configuration, resolving the secret from the
    /// environment first.
    pub fn to_store_config(&self) -> StoreConfig {
        self.to_store_config_with_secret(self.resolve_secret_key())
    }

    /// Build the store configuration with an already-resolved secret.
    pub fn to_store_config_with_secret(&self, secret: Option<ResolvedSecret>) -> StoreConfig {
        let mut config = StoreConfig::default()
            .with_cookie_name(self.cookie_name.clone())
            .with_path(self.path.clone())
            .with_http_only(self.http_only)
            .with_secure(self.secure)
            .with_same_site(self.same_site.into())
            .with_max_age(Duration::from_secs(self.max_age_secs))
            .with_storage_location(self.storage_location.clone())
            .with_insecure_default_key(self.allow_insecure_default_key)
            .with_cleanup_interval(Duration::from_secs(self.cleanup_interval_secs))
            .with_persist_empty_sessions(self.persist_empty_sessions);

        if let Some(ref domain) = self.domain {
            config = config.with_domain(domain.clone());
        }
        if let Some(secret) = secret {
            config = config.with_secret_key(secret.value.into_bytes());
        }
        config
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address to bind to.
    pub bind: String,
    /// Bearer token for admin routes. Prefer `CELLAR_ADMIN_TOKEN`.
    pub admin_token: Option<String>,
    /// Enable request logging.
    pub request_logging: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            admin_token: None,
            request_logging: true,
        }
    }
}

impl ServerSection {
    /// Parse the bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind.parse().map_err(|e| ConfigError::InvalidValue {
            field: "server.bind".to_string(),
            reason: format!("{}", e),
        })
    }

    /// Resolve the admin token from the environment or this section.
    pub fn resolve_admin_token(&self) -> Option<ResolvedSecret> {
        resolve_secret(ADMIN_TOKEN_ENV, self.admin_token.as_deref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Write JSON logs to daily rolling files.
    pub file: bool,
    /// Directory for log files. Defaults to the platform data directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
            directory: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
