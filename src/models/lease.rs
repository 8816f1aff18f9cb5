//! Editor lease model matching the lock service's wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The exclusive, time-bounded right to mutate one tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub tree_id: String,
    pub lock_owner: String,
    pub acquired_at: DateTime<Utc>,
    /// Epoch seconds after which the store drops the lease
    pub expires_at: i64,
}

impl Lease {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.lock_owner == user_id
    }
}

/// Response of the status call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub tree_id: String,
    pub locked: bool,
    pub lock: Option<Lease>,
}

impl LockStatus {
    pub fn from_lease(tree_id: &str, lease: Option<Lease>) -> Self {
        Self {
            tree_id: tree_id.to_string(),
            locked: lease.is_some(),
            lock: lease,
        }
    }
}

/// Response of the acquire call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireLockResponse {
    pub message: String,
    pub lock: Lease,
}

/// Response of the release and force-release calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseLockResponse {
    pub message: String,
}
