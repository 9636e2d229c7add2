//! SQLite connection for the tracker index.
//!
//! One pool serves every command. WAL keeps `fti search` readable while
//! an extraction or rescore pass holds the write lock, and the busy
//! timeout covers the bulk `CASE` rewrites in the incremental scorer,
//! which hold a writer far longer than SQLite's default grace period.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

/// Long enough to outlast one batched score flush under contention.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Open the index database named in the config, creating the file and
/// any missing parent directories on first use.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        // comments.issue_id references issues(id).
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
