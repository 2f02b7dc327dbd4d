//! Durable table interface.
//!
//! The store talks to storage only through [`SessionTable`], so any backend
//! with point lookups, conditional updates, deletes and an expiry range
//! query can hold
//! sessions. [`SqliteTable`](crate::SqliteTable) is the bundled
//! implementation.

use chrono::{DateTime, Utc};

use crate::error::Result;

/// A persisted session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    /// Primary key.
    pub id: String,

    /// Authenticated payload produced by [`SessionCodec`](crate::SessionCodec).
    pub payload: Vec<u8>,

    /// Instant after which the record is dead.
    pub expires_at: DateTime<Utc>,

    /// When the record was first written.
    pub created_at: DateTime<Utc>,

    /// When the record was last written.
    pub modified_at: DateTime<Utc>,
}

impl SessionRow {
    /// Whether the record is dead at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Storage backend for session records.
///
/// Each call must be atomic on its own. Implementations are shared between
/// request-handling tasks, so they must be safe to call concurrently.
pub trait SessionTable: Send + Sync {
    /// Point lookup. Returns the row even when it has expired; callers decide.
    fn load(&self, id: &str) -> Result<Option<SessionRow>>;

    /// Insert a new row. Returns `false` without writing when the ID exists.
    fn insert(&self, row: &SessionRow) -> Result<bool>;

    /// Replace payload, expiry and `modified_at` of an existing row, keeping
    /// its `created_at`. Returns `false` without writing when the ID is gone.
    fn update(&self, row: &SessionRow) -> Result<bool>;

    /// Delete by ID. Returns whether a row was removed.
    fn delete(&self, id: &str) -> Result<bool>;

    /// IDs of all rows with `expires_at <= now`.
    fn expired_ids(&self, now: DateTime<Utc>) -> Result<Vec<String>>;

    /// Delete one row if it is still expired at `now`.
    ///
    /// The row is re-read and `before_delete` is called only if it is still
    /// expired. No lock may be held while `before_delete` runs, and the
    /// delete must be conditional on the row still being expired, so a row
    /// extended by a concurrent update at any point after
    /// [`expired_ids`](Self::expired_ids) ran is left alone. Returns whether
    /// the row was deleted.
    fn reclaim(
        &self,
        id: &str,
        now: DateTime<Utc>,
        before_delete: &mut dyn FnMut(&SessionRow),
    ) -> Result<bool>;

    /// Number of stored rows, live or expired.
    fn count(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let row = SessionRow {
            id: "a".into(),
            payload: vec![],
            expires_at: now,
            created_at: now,
            modified_at: now,
        };

        assert!(row.is_expired_at(now));
        assert!(row.is_expired_at(now + Duration::milliseconds(1)));
        assert!(!row.is_expired_at(now - Duration::milliseconds(1)));
    }
}
