//! SQLite-backed HTTP session store.
//!
//! This crate maps signed session cookies to server-side records with:
//! - Unguessable 256-bit session IDs carried in HMAC-signed cookies
//! - Authenticated payloads, so edited or transplanted rows are rejected
//! - A background reclaimer that purges expired records and notifies a
//!   pre-delete callback first
//!
//! # Example
//!
//! ```rust,ignore
//! use cellar_session::{SessionStore, StoreConfig};
//!
//! let config = StoreConfig::new(secret_key)
//!     .with_storage_location("/var/lib/app/sessions.sqlite")
//!     .with_secure(true);
//!
//! let store = SessionStore::open(config).await?;
//!
//! let mut session = store.get(request.headers())?;
//! session.insert("user_id", user.id)?;
//! store.save(response.headers_mut(), &mut session)?;
//! ```

mod codec;
mod config;
mod error;
mod headers;
mod reclaimer;
mod session;
mod sqlite;
mod store;
mod table;

pub use codec::{SessionCodec, SessionValues, generate_session_id, is_well_formed_id, short_id};
pub use config::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_COOKIE_NAME, DEFAULT_COOKIE_PATH, DEFAULT_MAX_AGE,
    DEFAULT_STORAGE_LOCATION, MAX_SESSION_AGE, MIN_SECRET_KEY_LEN, SameSite, StoreConfig,
};
pub use error::{Error, Result};
pub use reclaimer::{PreDeleteCallback, ReclaimerState, SweepReport};
pub use session::Session;
pub use sqlite::SqliteTable;
pub use store::SessionStore;
pub use table::{SessionRow, SessionTable};
