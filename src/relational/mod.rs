//! Relational backend: SQLite behind per-operation IMMEDIATE transactions.
//!
//! Reads for mutation go through the write connection (tracked); read-only
//! projections go through a separate connection (untracked).

pub mod identity;
pub mod link_store;
pub mod models;
pub mod repositories;
pub mod schema;

use crate::store::StoreResult;
use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub use identity::SqlIdentity;
pub use link_store::SqlLinkStore;
pub use repositories::{SqlAlbumRepository, SqlArtistRepository, SqlMediaRepository, SqlUserRepository};

#[derive(Clone)]
pub struct SqlBackend {
    write_conn: Arc<Mutex<Connection>>,
    read_conn: Arc<Mutex<Connection>>,
}

impl SqlBackend {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let write_conn = schema::open_database(conn)?;

        let read_conn = Connection::open_with_flags(
            &db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        read_conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(SqlBackend {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_conn: Arc::new(Mutex::new(read_conn)),
        })
    }

    /// Single-connection backend for tests; tracked and untracked reads
    /// share the same in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = schema::open_database(Connection::open_in_memory()?)?;
        let shared = Arc::new(Mutex::new(conn));
        Ok(SqlBackend {
            write_conn: shared.clone(),
            read_conn: shared,
        })
    }

    /// Runs `f` inside a BEGIN IMMEDIATE transaction on the write
    /// connection, committing on Ok and rolling back on Err.
    pub(crate) fn with_tx<T>(
        &self,
        f: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute("BEGIN IMMEDIATE", [])?;
        match f(&conn) {
            Ok(value) => {
                conn.execute("COMMIT", [])?;
                Ok(value)
            }
            Err(err) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(err)
            }
        }
    }

    /// Runs `f` against the write connection without opening a
    /// transaction. Used for tracked reads.
    pub(crate) fn with_write_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let conn = self.write_conn.lock().unwrap();
        f(&conn)
    }

    /// Runs `f` against the read-only connection. Used for untracked
    /// reads and projections.
    pub(crate) fn with_read_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let conn = self.read_conn.lock().unwrap();
        f(&conn)
    }
}

pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
