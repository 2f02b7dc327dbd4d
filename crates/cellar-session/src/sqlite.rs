//! SQLite implementation of [`SessionTable`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::table::{SessionRow, SessionTable};

/// Current schema version, tracked in `PRAGMA user_version`.
const SCHEMA_VERSION: i32 = 1;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "SELECT id, payload, expires_at, created_at, modified_at FROM sessions";

/// Session table backed by a SQLite database file.
///
/// Each instance owns one connection. Use [`reconnect`](Self::reconnect) to
/// get an independent connection to the same file, e.g. for the reclaimer.
pub struct SqliteTable {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTable")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteTable {
    /// Open or create the database at `path`, creating the schema if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        let table = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        table.initialize(true)?;

        info!("Session table opened at {:?}", path);
        Ok(table)
    }

    /// Open a private in-memory database (for testing).
    ///
    /// In-memory tables cannot be reconnected.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let table = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        table.initialize(false)?;

        debug!("In-memory session table created");
        Ok(table)
    }

    /// Open another connection to the same database file.
    pub fn reconnect(&self) -> Result<Self> {
        match self.path {
            Some(ref path) => Self::open(path),
            None => Err(Error::StorageUnavailable(
                "an in-memory session table cannot be reconnected".into(),
            )),
        }
    }

    /// Database file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn initialize(&self, wal: bool) -> Result<()> {
        let conn = self.conn();

        conn.busy_timeout(BUSY_TIMEOUT)?;
        if wal {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(journal_mode = %mode, "Journal mode set");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        create_schema(&conn)
    }
}

fn create_schema(conn: &Connection) -> Result<()> {
    let current_version: i32 =
        conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current_version >= SCHEMA_VERSION {
        debug!("Schema up to date (version {})", current_version);
        return Ok(());
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            payload BLOB NOT NULL,
            expires_at INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            modified_at TEXT NOT NULL
        );

        -- Range scans by the reclaimer
        CREATE INDEX IF NOT EXISTS idx_sessions_expires_at
            ON sessions(expires_at);
        "#,
    )?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    info!("Session schema created (version {})", SCHEMA_VERSION);
    Ok(())
}

impl SessionTable for SqliteTable {
    fn load(&self, id: &str) -> Result<Option<SessionRow>> {
        let row = self
            .conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                row_to_session,
            )
            .optional()?;
        Ok(row)
    }

    fn insert(&self, row: &SessionRow) -> Result<bool> {
        let result = self.conn().execute(
            "INSERT INTO sessions (id, payload, expires_at, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.id,
                row.payload,
                row.expires_at.timestamp_millis(),
                row.created_at.to_rfc3339(),
                row.modified_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, row: &SessionRow) -> Result<bool> {
        let rows_affected = self.conn().execute(
            "UPDATE sessions SET payload = ?2, expires_at = ?3, modified_at = ?4
             WHERE id = ?1",
            params![
                row.id,
                row.payload,
                row.expires_at.timestamp_millis(),
                row.modified_at.to_rfc3339(),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let rows_affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows_affected > 0)
    }

    fn expired_ids(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id FROM sessions WHERE expires_at <= ?1 ORDER BY expires_at",
        )?;
        let iter = stmt.query_map(params![now.timestamp_millis()], |row| row.get(0))?;

        let mut ids = Vec::new();
        for id in iter {
            ids.push(id?);
        }
        Ok(ids)
    }

    fn reclaim(
        &self,
        id: &str,
        now: DateTime<Utc>,
        before_delete: &mut dyn FnMut(&SessionRow),
    ) -> Result<bool> {
        let now_ms = now.timestamp_millis();

        let row = self
            .conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1 AND expires_at <= ?2"),
                params![id, now_ms],
                row_to_session,
            )
            .optional()?;

        let Some(row) = row else {
            // Gone or extended since the scan.
            return Ok(false);
        };

        // No lock is held while the callback runs.
        before_delete(&row);

        let rows_affected = self.conn().execute(
            "DELETE FROM sessions WHERE id = ?1 AND expires_at <= ?2",
            params![id, now_ms],
        )?;
        Ok(rows_affected > 0)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    let expires_ms: i64 = row.get(2)?;
    let expires_at = DateTime::from_timestamp_millis(expires_ms).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(2, expires_ms)
    })?;

    Ok(SessionRow {
        id: row.get(0)?,
        payload: row.get(1)?,
        expires_at,
        created_at: parse_dt(&row.get::<_, String>(3)?),
        modified_at: parse_dt(&row.get::<_, String>(4)?),
    })
}
