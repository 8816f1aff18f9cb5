//! Explicit per-call scope: which tree, which caller.

use serde::{Deserialize, Serialize};

/// Scope of every lock and graph-store call.
///
/// `tree_id` is the partition key of the tree; `user_id` is the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeContext {
    pub tree_id: String,
    pub user_id: String,
}

impl TreeContext {
    pub fn new(tree_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tree_id: tree_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// A collaborator's role on a tree, as supplied by the authorization gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    /// Viewers never reach the lock coordinator.
    pub fn can_edit(self) -> bool {
        matches!(self, Role::Owner | Role::Editor)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
