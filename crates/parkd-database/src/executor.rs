//! Async SQLite executor using a dedicated background thread.
//!
//! All SQLite operations run on a single dedicated thread; callers send
//! closures through a channel and await the result. SQLite serializes
//! writes anyway, so one thread is optimal, and it keeps the Tokio
//! runtime free for other async work.
//!
//! Closures receive `&mut Connection` so they can open transactions.
//! Every multi-step state transition (check-in, check-out, closure)
//! runs as one transaction inside a single `call`, which is what makes
//! those transitions atomic under concurrency: conflicting calls are
//! simply queued behind each other in FIFO order.
//!
//! Only SQL should run inside `call()` - no file I/O, no heavy
//! computation, nothing that would starve the queued queries.

use crate::{migrations, DatabaseError, DatabaseResult};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// Convert a tokio_rusqlite::Error to DatabaseError.
fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> DatabaseError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => DatabaseError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => {
            DatabaseError::Connection("Connection closed".to_string())
        }
        other => DatabaseError::Connection(other.to_string()),
    }
}

/// Async SQLite database with a dedicated executor thread.
#[derive(Clone)]
pub struct AsyncDatabase {
    conn: Connection,
    path: String,
}

impl AsyncDatabase {
    /// Open a database at the given path.
    ///
    /// Creates the file (and parent directory) if missing, enables WAL
    /// mode and performance pragmas, runs pending migrations, and starts
    /// the dedicated executor thread.
    pub async fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();

        info!(path = %path_str, "Opening database");

        let conn = Connection::open(&path_str)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let db = Self {
            conn,
            path: path_str.clone(),
        };
        db.initialize().await?;

        info!(path = %path_str, "Database initialized with WAL mode");
        Ok(db)
    }

    /// Open an in-memory database. Used by tests; the same executor
    /// thread and migration path as `open`, minus the file pragmas.
    pub async fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let db = Self {
            conn,
            path: ":memory:".to_string(),
        };
        db.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            migrations::run_migrations(conn)
        })
        .await?;
        Ok(db)
    }

    async fn initialize(&self) -> DatabaseResult<()> {
        self.call(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA cache_size = -64000;
                PRAGMA temp_store = MEMORY;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
            migrations::run_migrations(conn)
        })
        .await
    }

    /// Execute a closure on the database connection.
    ///
    /// The closure runs on the dedicated SQLite thread; the caller's
    /// async task is parked (not blocked) until the result is ready.
    /// The `&mut Connection` allows `conn.transaction()` inside.
    pub async fn call<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        // Our DatabaseResult<T> rides inside the tokio_rusqlite Ok
        // variant, so domain errors pass through untouched.
        let outer = self.conn.call(move |conn| Ok(f(conn))).await;

        match outer {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Execute a closure that returns a rusqlite::Result.
    ///
    /// Convenience for simple queries that only produce rusqlite errors.
    pub async fn call_sqlite<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| Ok(f(conn)?))
            .await
            .map_err(from_tokio_rusqlite)
    }

    /// Get the database file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check liveness with a trivial query.
    pub async fn health_check(&self) -> DatabaseResult<()> {
        self.call_sqlite(|conn| conn.execute_batch("SELECT 1")).await?;
        debug!("Database health check passed");
        Ok(())
    }

    /// Close the database connection, waiting for pending operations.
    pub async fn close(self) -> DatabaseResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to close database: {e:?}")))?;
        info!(path = %self.path, "Database closed");
        Ok(())
    }
}
