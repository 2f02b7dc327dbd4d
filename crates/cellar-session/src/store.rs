//! The session store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::codec::{SessionCodec, SessionValues, generate_session_id, short_id};
use crate::config::{MAX_SESSION_AGE, StoreConfig};
use crate::error::{Error, Result};
use crate::headers::{append_removal_cookie, append_session_cookie, session_id_from_headers};
use crate::reclaimer::{CallbackSlot, PreDeleteCallback, Reclaimer, ReclaimerState, SweepReport};
use crate::session::Session;
use crate::sqlite::SqliteTable;
use crate::table::{SessionRow, SessionTable};

/// Attempts at finding an unused ID before giving up on a new session.
const MAX_ID_ATTEMPTS: usize = 3;

/// Maps signed session cookies to records in a durable table.
///
/// Request-path methods are synchronous and may be called from many tasks
/// at once; every call goes straight to the table. Expired records are
/// purged by a background [`Reclaimer`] owned by the store.
pub struct SessionStore {
    config: StoreConfig,
    codec: SessionCodec,
    table: Arc<dyn SessionTable>,
    callback: CallbackSlot,
    reclaimer: Reclaimer,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .field("reclaimer", &self.reclaimer)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Open the SQLite database named by the configuration and start the
    /// reclaimer.
    ///
    /// The file and its parent directory are created if absent. Two
    /// connections are opened: one for request handling and one for the
    /// reclaimer.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let location = config.storage_location.clone();
        let (request_table, sweep_table) = tokio::task::spawn_blocking(move || {
            let request_table = SqliteTable::open(&location)?;
            let sweep_table = request_table.reconnect()?;
            Ok::<_, Error>((request_table, sweep_table))
        })
        .await
        .map_err(|e| Error::StorageUnavailable(format!("open task failed: {}", e)))??;

        Self::start(config, Arc::new(request_table), Arc::new(sweep_table))
    }

    /// Build a store over caller-provided tables.
    ///
    /// `request_table` serves request-path calls and `sweep_table` the
    /// reclaimer; they may be the same instance. Must be called from within
    /// a Tokio runtime.
    pub fn with_tables(
        config: StoreConfig,
        request_table: Arc<dyn SessionTable>,
        sweep_table: Arc<dyn SessionTable>,
    ) -> Result<Self> {
        config.validate()?;
        Self::start(config, request_table, sweep_table)
    }

    fn start(
        config: StoreConfig,
        request_table: Arc<dyn SessionTable>,
        sweep_table: Arc<dyn SessionTable>,
    ) -> Result<Self> {
        if config.uses_insecure_default_key() {
            error!(
                "Session store is using the built-in insecure key. Anyone can forge \
                 session cookies. Configure a secret key before deploying."
            );
        }

        let codec = SessionCodec::new(&config.secret()?);
        let callback: CallbackSlot = Arc::new(RwLock::new(None));
        let reclaimer = Reclaimer::spawn(
            sweep_table,
            codec.clone(),
            Arc::clone(&callback),
            config.cleanup_interval,
        );

        info!(
            cookie = %config.cookie_name,
            location = ?config.storage_location,
            max_age_secs = config.max_age.as_secs(),
            "Session store opened"
        );

        Ok(Self {
            config,
            codec,
            table: request_table,
            callback,
            reclaimer,
        })
    }

    /// The configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Load the session referenced by the request's cookies.
    ///
    /// A missing or forged cookie, an unknown or expired record, or a payload
    /// that fails authentication all produce a fresh empty session. Only
    /// storage failures are returned as errors.
    pub fn get(&self, headers: &HeaderMap) -> Result<Session> {
        let Some(id) = session_id_from_headers(headers, &self.config, &self.codec) else {
            return Ok(Session::new());
        };

        let Some(row) = self.table.load(&id)? else {
            debug!(session = %short_id(&id), "Session not found, starting new");
            return Ok(Session::new());
        };

        if row.is_expired_at(Utc::now()) {
            debug!(session = %short_id(&id), "Session expired, starting new");
            return Ok(Session::new());
        }

        match self.codec.decode(&row.id, &row.payload) {
            Ok(values) => Ok(Session::from_stored(
                row.id,
                values,
                row.created_at,
                row.expires_at,
            )),
            Err(e) => {
                warn!(session = %short_id(&id), error = %e, "Discarding unreadable session");
                Ok(Session::new())
            }
        }
    }

    /// Persist the session and set the cookie on the response.
    ///
    /// The cookie is only written once the record is durable. A new session
    /// without values is skipped entirely unless the store persists empty
    /// sessions.
    ///
    /// A loaded session whose record was deleted in the meantime (revoked or
    /// reclaimed) is not brought back: the removal cookie is written and the
    /// session is reset to a new empty one.
    pub fn save(&self, headers: &mut HeaderMap, session: &mut Session) -> Result<()> {
        if session.is_new() && session.is_empty() && !self.config.persist_empty_sessions {
            debug!("Empty new session not persisted");
            return Ok(());
        }

        let max_age = session.max_age().unwrap_or(self.config.max_age);
        let now = Utc::now();
        let expires_at = expiry(now, max_age)?;

        let (id, created_at) = match session.id() {
            Some(id) if !session.is_new() => {
                let created_at = session.created_at().unwrap_or(now);
                let updated = self.table.update(&SessionRow {
                    id: id.to_string(),
                    payload: self.codec.encode(id, session.values())?,
                    expires_at,
                    created_at,
                    modified_at: now,
                })?;
                if !updated {
                    info!(session = %short_id(id), "Session removed during request, not saved");
                    append_removal_cookie(headers, &self.config)?;
                    session.reset();
                    return Ok(());
                }
                (id.to_string(), created_at)
            }
            _ => (self.insert_new(session.values(), now, expires_at)?, now),
        };

        append_session_cookie(headers, &self.config, &self.codec, &id, max_age)?;
        debug!(session = %short_id(&id), expires_at = %expires_at, "Session saved");
        session.mark_saved(id, created_at, expires_at);
        Ok(())
    }

    fn insert_new(
        &self,
        values: &SessionValues,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_session_id();
            let row = SessionRow {
                payload: self.codec.encode(&id, values)?,
                id,
                expires_at,
                created_at: now,
                modified_at: now,
            };
            if self.table.insert(&row)? {
                return Ok(row.id);
            }
            warn!(session = %short_id(&row.id), "Session ID collision, regenerating");
        }

        Err(Error::StorageUnavailable(format!(
            "no unused session ID after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    /// End the session: clear the cookie and remove the record.
    ///
    /// The removal cookie is written first, so it reaches the client even if
    /// the storage delete fails. The session is reset to a new empty one.
    pub fn delete(&self, headers: &mut HeaderMap, session: &mut Session) -> Result<()> {
        append_removal_cookie(headers, &self.config)?;

        let result = match session.id() {
            Some(id) => self.table.delete(id).map(|removed| {
                debug!(session = %short_id(id), removed, "Session deleted");
            }),
            None => Ok(()),
        };

        session.reset();
        result
    }

    /// Remove a session by ID, e.g. to revoke it from an admin tool.
    pub fn delete_by_id(&self, id: &str) -> Result<()> {
        if !self.table.delete(id)? {
            return Err(Error::NotFound(id.to_string()));
        }
        info!(session = %short_id(id), "Session revoked");
        Ok(())
    }

    /// Register the callback invoked with each expired session right before
    /// the reclaimer deletes it, replacing any previous one.
    ///
    /// The callback runs on the reclaimer's blocking thread with no database
    /// lock held, so it may call back into the store. Panics are caught and
    /// logged; the record is deleted anyway.
    pub fn set_pre_delete_callback<F>(&self, callback: F)
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let callback: PreDeleteCallback = Arc::new(callback);
        *self.callback.write() = Some(callback);
    }

    /// Remove the pre-delete callback.
    pub fn clear_pre_delete_callback(&self) {
        *self.callback.write() = None;
    }

    /// Run a sweep immediately on the calling thread.
    ///
    /// Returns `None` if a sweep is already in progress.
    pub fn sweep_now(&self) -> Result<Option<SweepReport>> {
        self.reclaimer.sweep_now()
    }

    /// State of the background reclaimer.
    pub fn reclaimer_state(&self) -> ReclaimerState {
        self.reclaimer.state()
    }

    /// Number of stored records, including expired ones not yet reclaimed.
    pub fn session_count(&self) -> Result<usize> {
        self.table.count()
    }

    /// Stop the reclaimer and release the store.
    pub async fn close(self) -> Result<()> {
        let Self { reclaimer, .. } = self;
        reclaimer.shutdown().await?;
        info!("Session store closed");
        Ok(())
    }
}

/// Expiry of a record saved at `now` with the given lifetime.
fn expiry(now: DateTime<Utc>, max_age: Duration) -> Result<DateTime<Utc>> {
    if max_age > MAX_SESSION_AGE {
        return Err(Error::ConfigInvalid(format!(
            "max_age {}s exceeds the maximum of {}s",
            max_age.as_secs(),
            MAX_SESSION_AGE.as_secs()
        )));
    }
    chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| Error::ConfigInvalid(format!("max_age {:?} out of range", max_age)))
}
