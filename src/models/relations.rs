//! Relationship edges and the derived direct-relations view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CreateMemberInput, Member};

/// A spouse of the focused member, with the marriage interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpouseInfo {
    #[serde(flatten)]
    pub member: Member,
    pub married: DateTime<Utc>,
    #[serde(default)]
    pub divorced: Option<DateTime<Utc>>,
}

/// The parents/children/spouses neighborhood of one focused member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectRelations {
    pub member: Member,
    #[serde(default)]
    pub parents: Vec<Member>,
    #[serde(default)]
    pub children: Vec<Member>,
    #[serde(default)]
    pub spouses: Vec<SpouseInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateChildInput {
    #[serde(flatten)]
    pub member: CreateMemberInput,
    pub parent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateParentInput {
    #[serde(flatten)]
    pub member: CreateMemberInput,
    pub child_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSpouseInput {
    #[serde(flatten)]
    pub member: CreateMemberInput,
    pub spouse_id: String,
    pub married: DateTime<Utc>,
    #[serde(default)]
    pub divorced: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSpouseRelationInput {
    pub husband_id: String,
    pub wife_id: String,
    pub married: DateTime<Utc>,
    #[serde(default)]
    pub divorced: Option<DateTime<Utc>>,
}

/// What a member deletion did to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    MemberDeleted,
    /// The deleted member was the last one; the store removed the whole tree.
    TreeDeleted,
}

/// Body returned by the graph service on member deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteMemberResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tree_deleted: bool,
}

impl DeleteMemberResponse {
    pub fn outcome(&self) -> DeleteOutcome {
        if self.tree_deleted {
            DeleteOutcome::TreeDeleted
        } else {
            DeleteOutcome::MemberDeleted
        }
    }
}
