//! Secret resolution.
//!
//! Resolution order:
//! 1. Environment variable
//! 2. Config file (with warning)

/// Environment variable holding the session signing secret.
pub const SECRET_KEY_ENV: &str = "CELLAR_SECRET_KEY";

/// Environment variable holding the admin API bearer token.
pub const ADMIN_TOKEN_ENV: &str = "CELLAR_ADMIN_TOKEN";

/// Result of secret resolution with provenance.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

impl std::fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file, stored in plaintext.
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve a secret from `env_var`, falling back to the config file value.
pub fn resolve_secret(env_var: &str, config_value: Option<&str>) -> Option<ResolvedSecret> {
    resolve_from(std::env::var(env_var).ok(), env_var, config_value)
}

fn resolve_from(
    env_value: Option<String>,
    env_var: &str,
    config_value: Option<&str>,
) -> Option<ResolvedSecret> {
    if let Some(value) = env_value
        && !value.is_empty()
    {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(env_var.to_string()),
        });
    }

    config_value
        .filter(|v| !v.is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_wins_over_config() {
        let secret = resolve_from(Some("from-env".into()), SECRET_KEY_ENV, Some("from-file"))
            .unwrap();
        assert_eq!(secret.value, "from-env");
        assert_eq!(secret.source, SecretSource::EnvVar(SECRET_KEY_ENV.into()));
    }

    #[test]
    fn test_empty_env_falls_back_to_config() {
        let secret = resolve_from(Some(String::new()), SECRET_KEY_ENV, Some("from-file")).unwrap();
        assert_eq!(secret.value, "from-file");
        assert_eq!(secret.source, SecretSource::ConfigFile);
    }

    #[test]
    fn test_nothing_configured() {
        assert_eq!(resolve_from(None, SECRET_KEY_ENV, None), None);
        assert_eq!(resolve_from(None, SECRET_KEY_ENV, Some("")), None);
    }

    #[test]
    fn test_debug_redacts_value() {
        let secret = resolve_from(None, SECRET_KEY_ENV, Some("hunter2")).unwrap();
        assert!(!format!("{:?}", secret).contains("hunter2"));
    }

    #[test]
    fn test_source_display() {
        assert_eq!(
            SecretSource::EnvVar("CELLAR_SECRET_KEY".into()).to_string(),
            "env var CELLAR_SECRET_KEY"
        );
        assert_eq!(SecretSource::ConfigFile.to_string(), "config file (plaintext)");
    }
}
