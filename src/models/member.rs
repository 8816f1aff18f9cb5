//! Member (person vertex) model matching the graph service's JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// A person in a family tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub gender: Gender,
    #[serde(default)]
    pub description: String,
    pub born: DateTime<Utc>,
    #[serde(default)]
    pub died: Option<DateTime<Utc>>,
    /// Storage key of the profile picture
    #[serde(default)]
    pub pic: String,
    /// Storage prefix of the photo gallery
    #[serde(default)]
    pub photos: String,
}

/// Fields required when creating a member. Gender and dates are fixed from here on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMemberInput {
    pub name: String,
    pub surname: String,
    pub gender: Gender,
    #[serde(default)]
    pub description: String,
    pub born: DateTime<Utc>,
    #[serde(default)]
    pub died: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pic: String,
    #[serde(default)]
    pub photos: String,
}

/// Fields that can change on an existing member. There is no way to express a
/// gender or date change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateMemberInput {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<String>,
}
