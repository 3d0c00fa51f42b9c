//! Trip Entities
//!
//! Sub-entities of a trip as the plann.er REST API returns them. Ids are
//! the server's `_id` strings; entities created locally and not yet
//! confirmed carry a placeholder id (see [`placeholder`]).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of locally minted ids
pub const PLACEHOLDER_PREFIX: &str = "tmp-";

/// Mint a fresh placeholder id for an entity the server has not confirmed yet.
pub fn placeholder() -> String {
    format!("{}{}", PLACEHOLDER_PREFIX, Uuid::new_v4())
}

/// Whether `id` was minted locally.
pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

/// A task on the trip's to-do list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Server id
    #[serde(rename = "_id")]
    pub id: String,
    /// What needs doing
    pub description: String,
    /// Whether the task has been done
    #[serde(default)]
    pub completed: bool,
}

/// A packing checklist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Server id
    #[serde(rename = "_id")]
    pub id: String,
    /// Item text
    pub text: String,
    /// Whether the item is packed
    #[serde(default)]
    pub checked: bool,
}

/// A guest invited to the trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    /// Server id
    #[serde(rename = "_id")]
    pub id: String,
    /// Display name
    pub name: String,
    /// Shareable invite link, assigned by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Editable trip header saved through the direct path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDraft {
    /// Destination name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// First day of the trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<NaiveDate>,
    /// Last day of the trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<NaiveDate>,
    /// Still a draft (not yet confirmed by the owner)
    #[serde(default)]
    pub is_draft: bool,
}

/// Entity data returned by a successful remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RemoteEntity {
    Task(Task),
    ChecklistItem(ChecklistItem),
    Guest(Guest),
}

impl RemoteEntity {
    /// Server id of the entity
    pub fn id(&self) -> &str {
        match self {
            Self::Task(task) => &task.id,
            Self::ChecklistItem(item) => &item.id,
            Self::Guest(guest) => &guest.id,
        }
    }
}
