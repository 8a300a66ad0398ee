//! SQLite metadata store bootstrap and shared connection handle.
//!
//! # Responsibility
//! - Open and configure the SQLite connection backing the type catalog.
//! - Apply schema migrations before any catalog or record access.
//! - Hand out a cloneable [`DbHandle`] that repositories share.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Every `DbHandle` wraps a connection whose migrations already succeeded.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "metadata schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Cloneable handle over one migrated SQLite connection.
///
/// All clones share the same connection. Access is serialized through a
/// mutex; contention policy beyond that belongs to the caller.
#[derive(Clone)]
pub struct DbHandle {
    conn: Arc<Mutex<Connection>>,
}

impl DbHandle {
    pub(crate) fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` with shared access to the underlying connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&self.lock())
    }

    /// Runs `f` with exclusive access, e.g. to open a transaction.
    pub fn with_conn_mut<T>(&self, f: impl FnOnce(&mut Connection) -> T) -> T {
        f(&mut self.lock())
    }

    /// Returns whether both handles point at the same connection.
    pub fn same_connection(&self, other: &DbHandle) -> bool {
        Arc::ptr_eq(&self.conn, &other.conn)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the guard leaves SQLite itself consistent.
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Debug for DbHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("shared_with", &Arc::strong_count(&self.conn))
            .finish()
    }
}
