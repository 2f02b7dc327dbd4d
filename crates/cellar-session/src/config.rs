//! Configuration for the session store.

use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

pub use cookie::SameSite;

use crate::error::{Error, Result};

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "session-id";

/// Default cookie path.
pub const DEFAULT_COOKIE_PATH: &str = "/";

/// Default session lifetime (one hour).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Longest accepted session lifetime (400 days, the cap browsers apply to
/// cookie lifetimes).
pub const MAX_SESSION_AGE: Duration = Duration::from_secs(400 * 24 * 60 * 60);

/// Default interval between reclaimer sweeps (five minutes).
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Default database file.
pub const DEFAULT_STORAGE_LOCATION: &str = "./sessions.sqlite";

/// Minimum accepted secret key length in bytes.
pub const MIN_SECRET_KEY_LEN: usize = 32;

/// Built-in key used only when `allow_insecure_default_key` is set.
///
/// Anyone who has read this source can forge cookies for a store using it.
pub(crate) const INSECURE_DEFAULT_KEY: &[u8] = b"cellar-insecure-default-key-do-not-deploy";

/// Configuration for a [`SessionStore`](crate::SessionStore).
///
/// Immutable once the store is open; changing policy means opening a new
/// store.
#[derive(Clone)]
pub struct StoreConfig {
    /// Name of the cookie carrying the session ID.
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
    pub same_site: SameSite,

    /// Session lifetime, applied as cookie `Max-Age` and as the record's
    /// expiry on every save.
    pub max_age: Duration,

    /// SQLite database file.
    pub storage_location: PathBuf,

    /// Secret used to sign cookies and authenticate payloads.
    pub secret_key: Option<Vec<u8>>,

    /// Fall back to the built-in key when no secret is configured.
    /// Development only.
    pub allow_insecure_default_key: bool,

    /// Interval between reclaimer sweeps.
    pub cleanup_interval: Duration,

    /// Write a row and issue a cookie for new sessions that hold no values.
    pub persist_empty_sessions: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            path: DEFAULT_COOKIE_PATH.to_string(),
            domain: None,
            http_only: true,
            secure: false,
            same_site: SameSite::Lax,
            max_age: DEFAULT_MAX_AGE,
            storage_location: PathBuf::from(DEFAULT_STORAGE_LOCATION),
            secret_key: None,
            allow_insecure_default_key: false,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            persist_empty_sessions: false,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("cookie_name", &self.cookie_name)
            .field("path", &self.path)
            .field("domain", &self.domain)
            .field("http_only", &self.http_only)
            .field("secure", &self.secure)
            .field("same_site", &self.same_site)
            .field("max_age", &self.max_age)
            .field("storage_location", &self.storage_location)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("allow_insecure_default_key", &self.allow_insecure_default_key)
            .field("cleanup_interval", &self.cleanup_interval)
            .field("persist_empty_sessions", &self.persist_empty_sessions)
            .finish()
    }
}

impl StoreConfig {
    /// Create a configuration with default values and the given secret key.
    pub fn new(secret_key: impl Into<Vec<u8>>) -> Self {
        Self {
            secret_key: Some(secret_key.into()),
            ..Default::default()
        }
    }

    /// Set the cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the cookie path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the cookie domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the `HttpOnly` flag.
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the `Secure` flag.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the `SameSite` policy.
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set the session lifetime.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the database file.
    pub fn with_storage_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_location = path.into();
        self
    }

    /// Set the secret key.
    pub fn with_secret_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.secret_key = Some(key.into());
        self
    }

    /// Allow falling back to the built-in insecure key.
    pub fn with_insecure_default_key(mut self, allowed: bool) -> Self {
        self.allow_insecure_default_key = allowed;
        self
    }

    /// Set the reclaimer sweep interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Persist new sessions even when they hold no values.
    pub fn with_persist_empty_sessions(mut self, persist: bool) -> Self {
        self.persist_empty_sessions = persist;
        self
    }

    /// Check the configuration, returning `ConfigInvalid` on the first problem.
    pub fn validate(&self) -> Result<()> {
        self.secret()?;

        if self.cookie_name.is_empty() {
            return Err(Error::ConfigInvalid("cookie name must not be empty".into()));
        }
        if !self.cookie_name.bytes().all(is_token_byte) {
            return Err(Error::ConfigInvalid(format!(
                "cookie name '{}' contains characters not allowed in a cookie name",
                self.cookie_name
            )));
        }
        if !is_attribute_value(&self.path) {
            return Err(Error::ConfigInvalid(format!(
                "cookie path '{}' is not a valid attribute value",
                self.path
            )));
        }
        if let Some(ref domain) = self.domain
            && (domain.is_empty() || !is_attribute_value(domain))
        {
            return Err(Error::ConfigInvalid(format!(
                "cookie domain '{}' is not a valid attribute value",
                domain
            )));
        }
        if self.max_age.is_zero() {
            return Err(Error::ConfigInvalid("max_age must be greater than zero".into()));
        }
        if self.max_age > MAX_SESSION_AGE {
            return Err(Error::ConfigInvalid(format!(
                "max_age {}s exceeds the maximum of {}s",
                self.max_age.as_secs(),
                MAX_SESSION_AGE.as_secs()
            )));
        }
        if self.cleanup_interval.is_zero() {
            return Err(Error::ConfigInvalid(
                "cleanup_interval must be greater than zero".into(),
            ));
        }
        if self.same_site == SameSite::None && !self.secure {
            tracing::warn!("SameSite=None without Secure will be rejected by most browsers");
        }

        Ok(())
    }

    /// The key material the codec should use.
    pub(crate) fn secret(&self) -> Result<Cow<'_, [u8]>> {
        match self.secret_key {
            Some(ref key) if key.len() >= MIN_SECRET_KEY_LEN => Ok(Cow::Borrowed(key.as_slice())),
            Some(ref key) => Err(Error::ConfigInvalid(format!(
                "secret key is {} bytes, at least {} are required",
                key.len(),
                MIN_SECRET_KEY_LEN
            ))),
            None if self.allow_insecure_default_key => Ok(Cow::Borrowed(INSECURE_DEFAULT_KEY)),
            None => Err(Error::ConfigInvalid(
                "no secret key configured; set one or explicitly allow the insecure default key"
                    .into(),
            )),
        }
    }

    /// Whether the store will run on the built-in key.
    pub fn uses_insecure_default_key(&self) -> bool {
        self.secret_key.is_none() && self.allow_insecure_default_key
    }
}

/// RFC 6265 cookie-name token characters.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_graphic()
        && !matches!(
            b,
            b'(' | b')'
                | b'<'
                | b'>'
                | b'@'
                | b','
                | b';'
                | b':'
                | b'\\'
                | b'"'
                | b'/'
                | b'['
                | b']'
                | b'?'
                | b'='
                | b'{'
                | b'}'
        )
}

fn is_attribute_value(s: &str) -> bool {
    s.bytes().all(|b| (b.is_ascii_graphic() || b == b' ') && b != b';')
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.cookie_name, "session-id");
        assert_eq!(config.path, "/");
        assert!(config.http_only);
        assert!(!config.secure);
        assert_eq!(config.max_age, Duration::from_secs(3600));
        assert_eq!(config.cleanup_interval, Duration::from_secs(300));
        assert_eq!(config.storage_location, PathBuf::from("./sessions.sqlite"));
        assert!(config.secret_key.is_none());
    }

    #[test]
    fn test_missing_key_rejected() {
        let err = StoreConfig::default().validate().unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn test_short_key_rejected() {
        let err = StoreConfig::new(b"short".to_vec()).validate().unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(msg) if msg.contains("at least 32")));
    }

    #[test]
    fn test_insecure_default_key_opt_in() {
        let config = StoreConfig::default().with_insecure_default_key(true);
        config.validate().unwrap();
        assert!(config.uses_insecure_default_key());
        assert_eq!(&*config.secret().unwrap(), INSECURE_DEFAULT_KEY);
        assert!(INSECURE_DEFAULT_KEY.len() >= MIN_SECRET_KEY_LEN);
    }

    #[test]
    fn test_configured_key_wins_over_default() {
        let config = StoreConfig::new(KEY).with_insecure_default_key(true);
        assert!(!config.uses_insecure_default_key());
        assert_eq!(&*config.secret().unwrap(), KEY);
    }

    #[test]
    fn test_zero_durations_rejected() {
        let err = StoreConfig::new(KEY)
            .with_max_age(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));

        let err = StoreConfig::new(KEY)
            .with_cleanup_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn test_max_age_upper_bound() {
        StoreConfig::new(KEY)
            .with_max_age(MAX_SESSION_AGE)
            .validate()
            .unwrap();

        let err = StoreConfig::new(KEY)
            .with_max_age(Duration::from_secs(10_000_000_000_000))
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn test_cookie_name_validation() {
        assert!(StoreConfig::new(KEY).with_cookie_name("").validate().is_err());
        assert!(StoreConfig::new(KEY).with_cookie_name("a b").validate().is_err());
        assert!(StoreConfig::new(KEY).with_cookie_name("a;b").validate().is_err());
        StoreConfig::new(KEY).with_cookie_name("__Host-sid").validate().unwrap();
    }

    #[test]
    fn test_attribute_validation() {
        assert!(StoreConfig::new(KEY).with_path("/a;b").validate().is_err());
        assert!(StoreConfig::new(KEY).with_domain("").validate().is_err());
        StoreConfig::new(KEY)
            .with_domain("example.com")
            .with_path("/app")
            .validate()
            .unwrap();
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", StoreConfig::new(KEY));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("0123456789abcdef"));
    }
}
