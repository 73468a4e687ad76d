//! Snapshot persistence.
//!
//! Stores the set of open tabs as a named JSON record in SQLite so they can
//! be restored when the next authenticated session starts.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::params;
use tracing::debug;

use crate::database::connection::Database;
use crate::types::errors::SessionError;
use crate::types::session::Snapshot;

/// Name of the record holding the open tabs.
pub const TABS_SNAPSHOT: &str = "tabs";

/// Trait defining snapshot persistence operations.
pub trait SessionManagerTrait {
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), SessionError>;
    fn load_snapshot(&self) -> Result<Option<Snapshot>, SessionError>;
    fn has_snapshot(&self) -> bool;
    fn clear_snapshot(&self) -> Result<(), SessionError>;
}

/// Snapshot store backed by SQLite.
pub struct SessionManager {
    db: Arc<Database>,
    name: String,
}

impl SessionManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_name(db, TABS_SNAPSHOT)
    }

    /// A store writing under a different record name, one per account.
    pub fn with_name(db: Arc<Database>, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }
}

impl SessionManagerTrait for SessionManager {
    /// Serializes the snapshot and replaces the stored record.
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), SessionError> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| SessionError::SerializationError(e.to_string()))?;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        self.db
            .connection()
            .execute(
                "INSERT INTO tab_snapshots (name, payload, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
                params![self.name, json, timestamp],
            )
            .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

        debug!(name = %self.name, items = snapshot.items.len(), "snapshot saved");
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<Snapshot>, SessionError> {
        let conn = self.db.connection();
        let result = conn.query_row(
            "SELECT payload FROM tab_snapshots WHERE name = ?1",
            params![self.name],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => {
                let snapshot: Snapshot = serde_json::from_str(&json)
                    .map_err(|e| SessionError::SerializationError(e.to_string()))?;
                Ok(Some(snapshot))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SessionError::DatabaseError(e.to_string())),
        }
    }

    fn has_snapshot(&self) -> bool {
        let conn = self.db.connection();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM tab_snapshots WHERE name = ?1",
                params![self.name],
                |row| row.get(0),
            )
            .unwrap_or(0);
        count > 0
    }

    fn clear_snapshot(&self) -> Result<(), SessionError> {
        self.db
            .connection()
            .execute("DELETE FROM tab_snapshots WHERE name = ?1", params![self.name])
            .map_err(|e| SessionError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
