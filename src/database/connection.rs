//! SQLite database connection management.
//!
//! Provides the [`Database`] struct that wraps a `rusqlite::Connection`
//! and automatically runs schema migrations on open.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::migrations;

/// Core database wrapper providing SQLite connection management.
///
/// The connection sits behind a mutex so a single `Arc<Database>` can be
/// shared by the snapshot store and the entity cache across async tasks.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) a SQLite database at the given file path and runs migrations.
    ///
    /// # Errors
    /// Returns `rusqlite::Error` if the connection cannot be established or migrations fail.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory SQLite database and runs migrations.
    ///
    /// Useful for testing: the database is discarded when the `Database` is dropped.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Locks and returns the underlying `rusqlite::Connection`.
    ///
    /// A poisoned lock is recovered: every statement is self-contained, so a
    /// panic in another holder cannot leave the connection half-written.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
