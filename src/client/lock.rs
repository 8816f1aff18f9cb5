//! Lock client: status / acquire / release / force-release against the lease store.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{build_http_client, join_url, scoped};
use crate::config::ClientConfig;
use crate::db::LeaseRepository;
use crate::errors::{codes, ErrorResponse, TreeError};
use crate::models::{AcquireLockResponse, Lease, LockStatus, ReleaseLockResponse, TreeContext};

/// Request/response access to the lease of one tree. Holds no local state.
#[async_trait]
pub trait LockClient: Send + Sync {
    /// Current lease, if any. No side effects.
    async fn status(&self, ctx: &TreeContext) -> Result<LockStatus, TreeError>;

    /// Take the lease for `ctx.user_id`. Fails with `LockConflict` if another
    /// user holds a live lease.
    async fn acquire(&self, ctx: &TreeContext) -> Result<Lease, TreeError>;

    /// Drop the caller's lease. Absent or expired leases are not an error.
    async fn release(&self, ctx: &TreeContext) -> Result<(), TreeError>;

    /// Drop the lease whoever holds it.
    async fn force_release(&self, ctx: &TreeContext) -> Result<(), TreeError>;
}

/// Lock client speaking to the lock service over HTTP.
#[derive(Clone)]
pub struct HttpLockClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

impl HttpLockClient {
    pub fn new(
        base_url: impl Into<String>,
        api_psk: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<Self, TreeError> {
        Ok(Self {
            http: build_http_client(api_psk, timeout)?,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TreeError> {
        Self::new(
            config.lock_url.clone(),
            config.api_psk.as_deref(),
            config.request_timeout,
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        ctx: &TreeContext,
    ) -> Result<T, TreeError> {
        let url = join_url(&self.base_url, path);
        tracing::debug!("{} {} for tree {}", method, url, ctx.tree_id);

        let response = scoped(self.http.request(method, url), ctx).send().await?;
        let status = response.status();

        if status.is_success() {
            let envelope: Envelope<T> = response.json().await?;
            return Ok(envelope.data);
        }

        let body = response.json::<ErrorResponse>().await.ok();
        Err(lock_error(status, body))
    }
}

/// Translate a lock service error envelope into the core's taxonomy.
fn lock_error(status: StatusCode, body: Option<ErrorResponse>) -> TreeError {
    let Some(body) = body else {
        return TreeError::Transport(format!("Lock service returned HTTP {}", status));
    };

    match body.error.code.as_str() {
        codes::LOCK_CONFLICT => {
            let owner = body
                .error
                .details
                .as_ref()
                .and_then(|d| d.get("lockOwner"))
                .and_then(|o| o.as_str())
                .unwrap_or("another user")
                .to_string();
            TreeError::LockConflict { owner }
        }
        codes::UNAUTHORIZED => TreeError::Unauthorized(body.error.message),
        code => TreeError::Transport(format!("{}: {}", code, body.error.message)),
    }
}

#[async_trait]
impl LockClient for HttpLockClient {
    async fn status(&self, ctx: &TreeContext) -> Result<LockStatus, TreeError> {
        self.call(Method::GET, "/api/editor-lock", ctx).await
    }

    async fn acquire(&self, ctx: &TreeContext) -> Result<Lease, TreeError> {
        let response: AcquireLockResponse = self
            .call(Method::POST, "/api/editor-lock/acquire", ctx)
            .await?;
        Ok(response.lock)
    }

    async fn release(&self, ctx: &TreeContext) -> Result<(), TreeError> {
        let _: ReleaseLockResponse = self
            .call(Method::DELETE, "/api/editor-lock/release", ctx)
            .await?;
        Ok(())
    }

    async fn force_release(&self, ctx: &TreeContext) -> Result<(), TreeError> {
        let _: ReleaseLockResponse = self
            .call(Method::POST, "/api/editor-lock/force-release", ctx)
            .await?;
        Ok(())
    }
}

/// In-process use of the lease table, for deployments that embed the store.
#[async_trait]
impl LockClient for LeaseRepository {
    async fn status(&self, ctx: &TreeContext) -> Result<LockStatus, TreeError> {
        let lease = LeaseRepository::status(self, &ctx.tree_id).await?;
        Ok(LockStatus::from_lease(&ctx.tree_id, lease))
    }

    async fn acquire(&self, ctx: &TreeContext) -> Result<Lease, TreeError> {
        Ok(LeaseRepository::acquire(self, &ctx.tree_id, &ctx.user_id).await?)
    }

    async fn release(&self, ctx: &TreeContext) -> Result<(), TreeError> {
        LeaseRepository::release(self, &ctx.tree_id, &ctx.user_id).await?;
        Ok(())
    }

    async fn force_release(&self, ctx: &TreeContext) -> Result<(), TreeError> {
        LeaseRepository::force_release(self, &ctx.tree_id).await?;
        Ok(())
    }
}
