//! SQLite persistence layer -- schema, config store, attempt ledger.
//!
//! Every piece of state that must survive a page reload lives here: the
//! target schedule, the priority list, the attempt counter, the scraped
//! session inventory, and the status log. The watch engine holds nothing
//! across lifetimes except what it reads back out of this layer.

pub mod ledger;
pub mod schema;
pub mod store;

use anyhow::Result;
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use thiserror::Error;

/// Shared connection pool handle, cloned into every store and ledger.
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Storage-layer failures. A failed round trip aborts the current decision
/// cycle without touching in-memory state; the next fire or reload retries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] r2d2::Error),
    #[error("storage query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(dir) = std::path::Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}
