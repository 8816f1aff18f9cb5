//! The mutation guard.
//!
//! Every mutating call passes through [`LockCoordinator::guard`]:
//!
//! 1. query the lease status;
//! 2. someone else's lease → `LockHeldByOther`, the mutation never runs;
//! 3. no lease → acquire; a failed acquire → `LockAcquisitionFailed`, the mutation never runs;
//! 4. our own lease → proceed without re-acquiring;
//! 5. run the mutation and return its result or error unchanged;
//! 6. on success, publish a [`MutationSucceeded`] event to the cache.
//!
//! The status pre-check is a fast path only. The lease store's conditional
//! acquire is what actually keeps two writers apart. A failed mutation leaves the
//! lease in place so the user can retry without racing for it again.

use std::future::Future;
use std::sync::Arc;

use crate::cache::{MutationKind, MutationSucceeded, TreeCache};
use crate::client::LockClient;
use crate::errors::TreeError;
use crate::models::{LockStatus, TreeContext};

/// The lease situation of a tree as seen by one caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    LockedByMe,
    LockedByOther { owner: String },
}

impl LockState {
    pub fn observe(status: &LockStatus, user_id: &str) -> Self {
        if !status.locked {
            return LockState::Unlocked;
        }
        match &status.lock {
            Some(lease) if lease.is_owned_by(user_id) => LockState::LockedByMe,
            Some(lease) => LockState::LockedByOther {
                owner: lease.lock_owner.clone(),
            },
            None => LockState::LockedByOther {
                owner: "another user".to_string(),
            },
        }
    }
}

/// Runs mutations only while the caller holds the tree's lease.
#[derive(Clone)]
pub struct LockCoordinator {
    lock: Arc<dyn LockClient>,
    cache: Arc<TreeCache>,
}

impl LockCoordinator {
    pub fn new(lock: Arc<dyn LockClient>, cache: Arc<TreeCache>) -> Self {
        Self { lock, cache }
    }

    /// Current lock state for `ctx.user_id`, always fetched fresh.
    pub async fn observe(&self, ctx: &TreeContext) -> Result<LockState, TreeError> {
        let status = self.lock.status(ctx).await?;
        Ok(LockState::observe(&status, &ctx.user_id))
    }

    /// Run `mutation` under the tree's lease.
    pub async fn guard<T, F, Fut>(
        &self,
        ctx: &TreeContext,
        kind: MutationKind,
        mutation: F,
    ) -> Result<T, TreeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, TreeError>>,
    {
        let state = self
            .observe(ctx)
            .await
            .map_err(|e| TreeError::LockAcquisitionFailed(Box::new(e)))?;

        match state {
            LockState::LockedByOther { owner } => {
                tracing::warn!(
                    "Refusing {} on tree {} for {}: locked by {}",
                    kind.as_str(),
                    ctx.tree_id,
                    ctx.user_id,
                    owner
                );
                return Err(TreeError::LockHeldByOther { owner });
            }
            LockState::Unlocked => {
                let lease = self.lock.acquire(ctx).await.map_err(|e| {
                    tracing::warn!(
                        "Could not acquire lock on tree {} for {}: {}",
                        ctx.tree_id,
                        ctx.user_id,
                        e
                    );
                    TreeError::LockAcquisitionFailed(Box::new(e))
                })?;
                tracing::info!(
                    "Acquired lock on tree {} for {} until {}",
                    ctx.tree_id,
                    ctx.user_id,
                    lease.expires_at
                );
                self.cache.invalidate_lock_status(&ctx.tree_id).await;
            }
            LockState::LockedByMe => {
                tracing::debug!("Lock on tree {} already held by {}", ctx.tree_id, ctx.user_id);
            }
        }

        let output = mutation().await.map_err(|e| {
            tracing::warn!(
                "{} on tree {} failed for {} (retryable: {}): {}",
                kind.as_str(),
                ctx.tree_id,
                ctx.user_id,
                e.is_retryable(),
                e
            );
            e
        })?;

        self.cache
            .apply(&MutationSucceeded {
                tree_id: ctx.tree_id.clone(),
                kind,
            })
            .await;

        Ok(output)
    }
}
