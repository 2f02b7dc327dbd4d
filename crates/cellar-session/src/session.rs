//! The session handle returned to request handlers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::SessionValues;
use crate::error::Result;

/// Server-side state for one client.
///
/// Obtained from [`SessionStore::get`](crate::SessionStore::get), mutated by
/// the handler, and written back with
/// [`SessionStore::save`](crate::SessionStore::save).
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: Option<String>,
    values: SessionValues,
    is_new: bool,
    max_age: Option<Duration>,
    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session with no ID and no values.
    pub fn new() -> Self {
        Self {
            id: None,
            values: SessionValues::new(),
            is_new: true,
            max_age: None,
            created_at: None,
            expires_at: None,
        }
    }

    /// Rebuild a session from a stored record.
    pub(crate) fn from_stored(
        id: String,
        values: SessionValues,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            values,
            is_new: false,
            max_age: None,
            created_at: Some(created_at),
            expires_at: Some(expires_at),
        }
    }

    /// Session ID, assigned on first save.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether this session has not been loaded from or written to storage.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// All values.
    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    /// Mutable access to all values.
    pub fn values_mut(&mut self) -> &mut SessionValues {
        &mut self.values
    }

    /// Whether the session holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw JSON value for `key`.
    pub fn get_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Typed value for `key`. Returns `None` when absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Store a serializable value under `key`.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.into(), value);
        Ok(())
    }

    /// Store a raw JSON value under `key`, returning the previous one.
    pub fn insert_value(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.values.insert(key.into(), value)
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    /// Remove all values.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Override the store's max-age for this session's next save.
    ///
    /// Lifetimes above [`MAX_SESSION_AGE`](crate::MAX_SESSION_AGE) make the
    /// save fail with `ConfigInvalid`.
    pub fn set_max_age(&mut self, max_age: Duration) {
        self.max_age = Some(max_age);
    }

    /// Per-session max-age override, if any.
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// When the record was first written.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// When the record expires, as of the last load or save.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub(crate) fn mark_saved(
        &mut self,
        id: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) {
        self.id = Some(id);
        self.is_new = false;
        self.created_at = Some(created_at);
        self.expires_at = Some(expires_at);
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Cart {
        items: Vec<String>,
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = Session::new();
        assert!(session.is_new());
        assert!(session.is_empty());
        assert_eq!(session.id(), None);
        assert_eq!(session.expires_at(), None);
    }

    #[test]
    fn test_typed_values() {
        let mut session = Session::new();
        session.insert("user_id", 7_u64).unwrap();
        session
            .insert("cart", Cart { items: vec!["tea".into()] })
            .unwrap();

        assert_eq!(session.get::<u64>("user_id"), Some(7));
        assert_eq!(
            session.get::<Cart>("cart"),
            Some(Cart { items: vec!["tea".into()] })
        );
        assert_eq!(session.get::<String>("user_id"), None);
        assert_eq!(session.get::<u64>("missing"), None);
    }

    #[test]
    fn test_raw_values_and_removal() {
        let mut session = Session::new();
        assert_eq!(session.insert_value("flag", json!(true)), None);
        assert_eq!(session.insert_value("flag", json!(false)), Some(json!(true)));
        assert_eq!(session.get_value("flag"), Some(&json!(false)));

        assert_eq!(session.remove("flag"), Some(json!(false)));
        assert!(session.is_empty());

        session.insert_value("a", json!(1));
        session.values_mut().insert("b".into(), json!(2));
        assert_eq!(session.values().len(), 2);
        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn test_mark_saved_and_reset() {
        let mut session = Session::new();
        session.set_max_age(Duration::from_secs(5));
        let now = Utc::now();
        session.mark_saved("abc".into(), now, now);

        assert!(!session.is_new());
        assert_eq!(session.id(), Some("abc"));
        assert_eq!(session.max_age(), Some(Duration::from_secs(5)));

        session.reset();
        assert_eq!(session, Session::new());
    }
}
