//! Lease repository: one row per tree, expiring on its own.
//!
//! Every write is a single conditional statement, so two writers racing for the
//! same tree are serialized by SQLite rather than by the callers' pre-checks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{Row, SqlitePool};

use crate::clock::{Clock, SystemClock};
use crate::errors::AppError;
use crate::models::Lease;

/// Database repository for editor leases.
#[derive(Clone)]
pub struct LeaseRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    ttl_secs: i64,
}

impl LeaseRepository {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self::with_clock(pool, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(0)
    }

    /// Get the live lease on a tree, if any. Expired rows are invisible.
    pub async fn status(&self, tree_id: &str) -> Result<Option<Lease>, AppError> {
        let row = sqlx::query(
            "SELECT tree_id, lock_owner, acquired_at, expires_at FROM editor_locks WHERE tree_id = ? AND expires_at > ?",
        )
        .bind(tree_id)
        .bind(self.now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(lease_from_row))
    }

    /// Acquire (or refresh) the lease for `owner`.
    ///
    /// Succeeds when the tree has no lease, an expired lease, or a lease already
    /// owned by `owner`. A live lease of anyone else yields `LockConflict`.
    pub async fn acquire(&self, tree_id: &str, owner: &str) -> Result<Lease, AppError> {
        let now = self.now();
        let expires_at = now.timestamp().saturating_add(self.ttl_secs);

        let result = sqlx::query(
            r#"INSERT INTO editor_locks (tree_id, lock_owner, acquired_at, expires_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(tree_id) DO UPDATE SET
                   lock_owner = excluded.lock_owner,
                   acquired_at = excluded.acquired_at,
                   expires_at = excluded.expires_at
               WHERE editor_locks.expires_at <= ? OR editor_locks.lock_owner = excluded.lock_owner"#,
        )
        .bind(tree_id)
        .bind(owner)
        .bind(now)
        .bind(expires_at)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let holder = self.fetch_row(tree_id).await?;
            tracing::info!(
                "Lock on tree {} refused for {}: held by {:?}",
                tree_id,
                owner,
                holder.as_ref().map(|l| &l.lock_owner)
            );
            return Err(match holder {
                Some(lease) => conflict(tree_id, &lease),
                None => AppError::Internal(format!(
                    "Lease on tree {} changed during acquire",
                    tree_id
                )),
            });
        }

        tracing::info!("Lock on tree {} acquired by {} until {}", tree_id, owner, expires_at);

        Ok(Lease {
            tree_id: tree_id.to_string(),
            lock_owner: owner.to_string(),
            acquired_at: now,
            expires_at,
        })
    }

    /// Release `owner`'s lease. Releasing an absent or expired lease is a no-op.
    ///
    /// Returns whether a row was removed.
    pub async fn release(&self, tree_id: &str, owner: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM editor_locks WHERE tree_id = ? AND (lock_owner = ? OR expires_at <= ?)",
        )
        .bind(tree_id)
        .bind(owner)
        .bind(self.now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!("Lock on tree {} released by {}", tree_id, owner);
            return Ok(true);
        }

        match self.status(tree_id).await? {
            Some(lease) if !lease.is_owned_by(owner) => Err(conflict(tree_id, &lease)),
            _ => Ok(false),
        }
    }

    /// Remove the lease regardless of owner. Returns whether a row was removed.
    pub async fn force_release(&self, tree_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM editor_locks WHERE tree_id = ?")
            .bind(tree_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every expired lease.
    pub async fn sweep_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM editor_locks WHERE expires_at <= ?")
            .bind(self.now().timestamp())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Raw row lookup, ignoring expiry.
    async fn fetch_row(&self, tree_id: &str) -> Result<Option<Lease>, AppError> {
        let row = sqlx::query(
            "SELECT tree_id, lock_owner, acquired_at, expires_at FROM editor_locks WHERE tree_id = ?",
        )
        .bind(tree_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(lease_from_row))
    }
}

fn conflict(tree_id: &str, lease: &Lease) -> AppError {
    AppError::LockConflict {
        message: format!(
            "Tree {} is currently being edited by {}",
            tree_id, lease.lock_owner
        ),
        lock_owner: lease.lock_owner.clone(),
        expires_at: lease.expires_at,
    }
}

fn lease_from_row(row: &sqlx::sqlite::SqliteRow) -> Lease {
    Lease {
        tree_id: row.get("tree_id"),
        lock_owner: row.get("lock_owner"),
        acquired_at: row.get("acquired_at"),
        expires_at: row.get("expires_at"),
    }
}
