//! Database module for SQLite persistence.
//!
//! SQLite holds the lease table; a background sweeper plays the role of the store's TTL reaper.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS editor_locks (
            tree_id TEXT PRIMARY KEY,
            lock_owner TEXT NOT NULL,
            acquired_at TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_editor_locks_expires_at ON editor_locks(expires_at);")
        .execute(pool)
        .await?;

    Ok(())
}

/// Periodically delete expired leases, the way a TTL attribute would.
///
/// Reads already ignore expired rows, so the sweeper only keeps the table small.
pub fn spawn_expiry_sweeper(
    repo: Arc<LeaseRepository>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    let every = every.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match repo.sweep_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!("Swept {} expired editor lock(s)", removed),
                Err(e) => tracing::warn!("Expired lock sweep failed: {}", e),
            }
        }
    })
}
