//! Configuration system for the Cellar session service.
//!
//! Provides TOML-based configuration with:
//! - `[session]`, `[server]` and `[logging]` sections
//! - Config file layering (XDG user config + project-local overrides)
//! - Secret resolution (env var → config file, with a warning for the latter)

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{ADMIN_TOKEN_ENV, ResolvedSecret, SECRET_KEY_ENV, SecretSource, resolve_secret};
pub use types::*;
