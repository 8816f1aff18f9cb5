//! Editor lock API endpoints.

use axum::extract::State;

use super::{success, ApiResult};
use crate::auth::TreeCaller;
use crate::models::{AcquireLockResponse, LockStatus, ReleaseLockResponse};
use crate::AppState;

/// GET /api/editor-lock - Get the current lease of the caller's tree.
pub async fn get_lock_status(
    State(state): State<AppState>,
    TreeCaller(ctx): TreeCaller,
) -> ApiResult<LockStatus> {
    let lease = state.leases.status(&ctx.tree_id).await?;
    success(LockStatus::from_lease(&ctx.tree_id, lease))
}

/// POST /api/editor-lock/acquire - Take or refresh the lease.
pub async fn acquire_lock(
    State(state): State<AppState>,
    TreeCaller(ctx): TreeCaller,
) -> ApiResult<AcquireLockResponse> {
    let lock = state.leases.acquire(&ctx.tree_id, &ctx.user_id).await?;
    success(AcquireLockResponse {
        message: "Editor lock acquired".to_string(),
        lock,
    })
}

/// DELETE /api/editor-lock/release - Drop the caller's own lease.
pub async fn release_lock(
    State(state): State<AppState>,
    TreeCaller(ctx): TreeCaller,
) -> ApiResult<ReleaseLockResponse> {
    let removed = state.leases.release(&ctx.tree_id, &ctx.user_id).await?;
    let message = if removed {
        "Editor lock released"
    } else {
        "No editor lock to release"
    };
    success(ReleaseLockResponse {
        message: message.to_string(),
    })
}

/// POST /api/editor-lock/force-release - Drop the lease whoever holds it.
pub async fn force_release_lock(
    State(state): State<AppState>,
    TreeCaller(ctx): TreeCaller,
) -> ApiResult<ReleaseLockResponse> {
    let previous = state.leases.status(&ctx.tree_id).await?;
    let removed = state.leases.force_release(&ctx.tree_id).await?;

    if let Some(lease) = previous.filter(|l| !l.is_owned_by(&ctx.user_id)) {
        tracing::warn!(
            "Editor lock on tree {} held by {} force-released by {}",
            ctx.tree_id,
            lease.lock_owner,
            ctx.user_id
        );
    }

    let message = if removed {
        "Editor lock force-released"
    } else {
        "No editor lock to release"
    };
    success(ReleaseLockResponse {
        message: message.to_string(),
    })
}
