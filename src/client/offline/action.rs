//! # Pending Actions
//!
//! The unit of deferred work. A [`PendingAction`] wraps one [`Mutation`]
//! scoped to exactly one trip, plus the bookkeeping the queue needs
//! (enqueue time, attempt counter, last error).
//!
//! Each `Mutation` variant carries only the fields its remote call needs.
//! Adds carry the placeholder id the UI rendered the new entity under.

use crate::client::offline::guard::GuardKey;
use crate::shared::error::SyncError;
use crate::shared::trip::{self, RemoteEntity, TripDraft};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a queued action
pub type ActionId = Uuid;

/// What an action does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Add,
    Update,
    Delete,
}

/// Which trip sub-entity an action touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    Task,
    ChecklistItem,
    Guest,
    TripDraft,
}

/// A mutation intent issued by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    AddTask {
        placeholder_id: String,
        description: String,
    },
    SetTaskCompleted {
        task_id: String,
        completed: bool,
    },
    DeleteTask {
        task_id: String,
    },
    AddChecklistItem {
        placeholder_id: String,
        text: String,
    },
    SetChecklistItemChecked {
        item_id: String,
        checked: bool,
    },
    DeleteChecklistItem {
        item_id: String,
    },
    AddGuest {
        placeholder_id: String,
        name: String,
    },
    RenameGuest {
        guest_id: String,
        name: String,
    },
    DeleteGuest {
        guest_id: String,
    },
    /// Only queued when a direct draft save could not reach the server
    SaveTripDraft {
        draft: TripDraft,
    },
}

impl Mutation {
    /// Add a task under a freshly minted placeholder id
    pub fn add_task(description: impl Into<String>) -> Self {
        Self::AddTask {
            placeholder_id: trip::placeholder(),
            description: description.into(),
        }
    }

    /// Add a checklist item under a freshly minted placeholder id
    pub fn add_checklist_item(text: impl Into<String>) -> Self {
        Self::AddChecklistItem {
            placeholder_id: trip::placeholder(),
            text: text.into(),
        }
    }

    /// Invite a guest under a freshly minted placeholder id
    pub fn add_guest(name: impl Into<String>) -> Self {
        Self::AddGuest {
            placeholder_id: trip::placeholder(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::AddTask { .. } | Self::AddChecklistItem { .. } | Self::AddGuest { .. } => {
                ActionKind::Add
            }
            Self::SetTaskCompleted { .. }
            | Self::SetChecklistItemChecked { .. }
            | Self::RenameGuest { .. }
            | Self::SaveTripDraft { .. } => ActionKind::Update,
            Self::DeleteTask { .. } | Self::DeleteChecklistItem { .. } | Self::DeleteGuest { .. } => {
                ActionKind::Delete
            }
        }
    }

    pub fn target(&self) -> TargetType {
        match self {
            Self::AddTask { .. } | Self::SetTaskCompleted { .. } | Self::DeleteTask { .. } => {
                TargetType::Task
            }
            Self::AddChecklistItem { .. }
            | Self::SetChecklistItemChecked { .. }
            | Self::DeleteChecklistItem { .. } => TargetType::ChecklistItem,
            Self::AddGuest { .. } | Self::RenameGuest { .. } | Self::DeleteGuest { .. } => {
                TargetType::Guest
            }
            Self::SaveTripDraft { .. } => TargetType::TripDraft,
        }
    }

    /// Server id of an existing entity; `None` for adds and draft saves.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::SetTaskCompleted { task_id, .. } | Self::DeleteTask { task_id } => {
                Some(task_id.as_str())
            }
            Self::SetChecklistItemChecked { item_id, .. } | Self::DeleteChecklistItem { item_id } => {
                Some(item_id.as_str())
            }
            Self::RenameGuest { guest_id, .. } | Self::DeleteGuest { guest_id } => {
                Some(guest_id.as_str())
            }
            _ => None,
        }
    }

    /// Placeholder id of an add
    pub fn placeholder_id(&self) -> Option<&str> {
        match self {
            Self::AddTask { placeholder_id, .. }
            | Self::AddChecklistItem { placeholder_id, .. }
            | Self::AddGuest { placeholder_id, .. } => Some(placeholder_id.as_str()),
            _ => None,
        }
    }

    fn entity_id_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::SetTaskCompleted { task_id, .. } | Self::DeleteTask { task_id } => Some(task_id),
            Self::SetChecklistItemChecked { item_id, .. } | Self::DeleteChecklistItem { item_id } => {
                Some(item_id)
            }
            Self::RenameGuest { guest_id, .. } | Self::DeleteGuest { guest_id } => Some(guest_id),
            _ => None,
        }
    }
}

/// A mutation waiting in the persistent queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Queue-assigned id
    pub id: ActionId,
    /// Owning trip
    pub trip_id: String,
    /// What to do
    pub mutation: Mutation,
    /// Replay order, oldest first
    pub enqueued_at: DateTime<Utc>,
    /// Failed remote attempts so far
    #[serde(default)]
    pub attempts: u32,
    /// Error message from the last failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingAction {
    /// Wrap a mutation for queueing
    pub fn new(trip_id: impl Into<String>, mutation: Mutation) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id: trip_id.into(),
            mutation,
            enqueued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.mutation.kind()
    }

    pub fn target(&self) -> TargetType {
        self.mutation.target()
    }

    /// Id of whatever the action touches: the server id, the add's
    /// placeholder, or the trip itself for draft saves.
    pub fn entity_ref(&self) -> &str {
        self.mutation
            .entity_id()
            .or_else(|| self.mutation.placeholder_id())
            .unwrap_or(self.trip_id.as_str())
    }

    /// In-flight guard key for this action
    pub fn guard_key(&self) -> GuardKey {
        GuardKey::new(self.kind(), self.target(), &self.trip_id, self.entity_ref())
    }

    /// Whether the action targets an entity the server has not confirmed.
    pub fn depends_on_placeholder(&self) -> Option<&str> {
        self.mutation
            .entity_id()
            .filter(|id| trip::is_placeholder(id))
    }

    /// Point the action at `server_id` if it targets `placeholder_id`.
    pub fn retarget(&mut self, placeholder_id: &str, server_id: &str) -> bool {
        match self.mutation.entity_id_mut() {
            Some(id) if id == placeholder_id => {
                *id = server_id.to_string();
                true
            }
            _ => false,
        }
    }
}

/// Result of one dispatch attempt, as seen by the initiator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The server confirmed the action; adds and updates may carry data
    Succeeded(Option<RemoteEntity>),
    /// The server rejected the action. Non-terminal failures stay queued.
    Failed {
        error: SyncError,
        attempts: u32,
        terminal: bool,
    },
    /// No connectivity; the action stays queued for replay
    Offline,
}

impl ActionOutcome {
    /// Succeeded, or failed for good.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Succeeded(_) => true,
            Self::Failed { terminal, .. } => *terminal,
            Self::Offline => false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}
