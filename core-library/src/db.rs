//! # Library Database
//!
//! Opens the SQLite pool behind [`LibraryStorage`](crate::LibraryStorage).
//!
//! File-backed stores run in WAL mode so background sync contexts can write
//! while UI contexts read. Foreign keys are enforced for the `ON DELETE`
//! rules, and the embedded migrations run on every open.
//!
//! ```rust,ignore
//! use core_library::db::open_library;
//! use core_library::LibraryStorage;
//!
//! let pool = open_library("library.db").await?;
//! let mut library = LibraryStorage::new(pool.clone());
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_FILE_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Open (creating if missing) the library database at `path`.
pub async fn open_library(path: impl AsRef<Path>) -> Result<SqlitePool> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(LibraryError::InvalidInput {
            field: "database_path".to_string(),
            message: "library database path is empty".to_string(),
        });
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_FILE_CONNECTIONS)
        .idle_timeout(Duration::from_secs(600));
    connect(pool, options).await
}

/// In-memory pool with migrations applied.
///
/// Every in-memory connection opens its own empty database, so the pool is
/// pinned to a single connection that never expires.
pub async fn create_test_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new().in_memory(true);
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .max_lifetime(None)
        .idle_timeout(None);
    connect(pool, options).await
}

async fn connect(pool: SqlitePoolOptions, options: SqliteConnectOptions) -> Result<SqlitePool> {
    let options = options.foreign_keys(true).busy_timeout(BUSY_TIMEOUT);
    let pool = pool
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to open library database");
            LibraryError::from(e)
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Migration failed");
            LibraryError::Migration(e.to_string())
        })?;
    debug!("Library migrations applied");

    sqlx::query("SELECT 1").fetch_one(&pool).await?;
    info!(connections = pool.size(), "Library database ready");
    Ok(pool)
}
