//! # Optimistic UI Updates
//!
//! Applies a mutation to the local [`TripView`] the moment it is submitted and
//! reconciles it once the dispatcher reports an outcome.
//!
//! ## Features
//!
//! - **Immediate Updates**: new entities appear under their placeholder id
//! - **Confirmation**: server data replaces the placeholder on success
//! - **Rollback**: a snapshot taken before mutating is restored on terminal
//!   failure
//! - **Retry Transparency**: non-terminal failures and offline markers leave
//!   the optimistic state in place
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut optimistic = OptimisticManager::new(view);
//! let submission = dispatcher.submit("trip-1", Mutation::add_checklist_item("Sunscreen"));
//! if let Some(receipt) = submission.receipt() {
//!     optimistic.apply(receipt.action());
//!     let outcome = receipt.settled().await;
//! }
//! // or from the broadcast stream
//! optimistic.settle(&event.action_id, &event.outcome);
//! ```

use crate::client::offline::action::{ActionId, ActionOutcome, Mutation, PendingAction};
use crate::shared::trip::{ChecklistItem, Guest, RemoteEntity, Task, TripDraft};
use std::collections::HashMap;

/// Local view of one trip as the UI renders it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripView {
    pub trip_id: String,
    pub tasks: Vec<Task>,
    pub checklist: Vec<ChecklistItem>,
    pub guests: Vec<Guest>,
    pub draft: TripDraft,
}

impl TripView {
    pub fn new(trip_id: impl Into<String>) -> Self {
        Self {
            trip_id: trip_id.into(),
            ..Self::default()
        }
    }

    /// Replace the entity with the same id; `false` if there is none.
    fn replace(&mut self, id: &str, entity: RemoteEntity) -> bool {
        match entity {
            RemoteEntity::Task(task) => replace_in(&mut self.tasks, id, task, |t| &t.id),
            RemoteEntity::ChecklistItem(item) => {
                replace_in(&mut self.checklist, id, item, |i| &i.id)
            }
            RemoteEntity::Guest(guest) => replace_in(&mut self.guests, id, guest, |g| &g.id),
        }
    }

    fn insert_at(&mut self, index: usize, entity: RemoteEntity) {
        match entity {
            RemoteEntity::Task(task) => insert_clamped(&mut self.tasks, index, task),
            RemoteEntity::ChecklistItem(item) => insert_clamped(&mut self.checklist, index, item),
            RemoteEntity::Guest(guest) => insert_clamped(&mut self.guests, index, guest),
        }
    }

    fn remove(&mut self, id: &str) -> Option<(usize, RemoteEntity)> {
        if let Some(index) = self.tasks.iter().position(|t| t.id == id) {
            return Some((index, RemoteEntity::Task(self.tasks.remove(index))));
        }
        if let Some(index) = self.checklist.iter().position(|i| i.id == id) {
            return Some((index, RemoteEntity::ChecklistItem(self.checklist.remove(index))));
        }
        if let Some(index) = self.guests.iter().position(|g| g.id == id) {
            return Some((index, RemoteEntity::Guest(self.guests.remove(index))));
        }
        None
    }

    fn find(&self, id: &str) -> Option<RemoteEntity> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .map(RemoteEntity::Task)
            .or_else(|| {
                self.checklist
                    .iter()
                    .find(|i| i.id == id)
                    .cloned()
                    .map(RemoteEntity::ChecklistItem)
            })
            .or_else(|| {
                self.guests
                    .iter()
                    .find(|g| g.id == id)
                    .cloned()
                    .map(RemoteEntity::Guest)
            })
    }
}

fn replace_in<T>(items: &mut [T], id: &str, value: T, id_of: impl Fn(&T) -> &String) -> bool {
    match items.iter_mut().find(|item| id_of(item) == id) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => false,
    }
}

fn insert_clamped<T>(items: &mut Vec<T>, index: usize, value: T) {
    let index = index.min(items.len());
    items.insert(index, value);
}

/// How to undo one optimistic change
#[derive(Debug, Clone, PartialEq, Eq)]
enum Snapshot {
    /// A new entity was inserted under a placeholder id
    Inserted { placeholder_id: String },
    /// An existing entity was modified in place
    Replaced { prior: RemoteEntity },
    /// An existing entity was removed from position `index`
    Removed { index: usize, prior: RemoteEntity },
    Draft { prior: TripDraft },
}

/// Optimistic update manager for one trip view
#[derive(Debug, Default)]
pub struct OptimisticManager {
    view: TripView,
    snapshots: HashMap<ActionId, Snapshot>,
}

impl OptimisticManager {
    pub fn new(view: TripView) -> Self {
        Self {
            view,
            snapshots: HashMap::new(),
        }
    }

    pub fn view(&self) -> &TripView {
        &self.view
    }

    /// Apply the action's change locally. Actions for other trips, or
    /// against entities the view does not have, are ignored.
    pub fn apply(&mut self, action: &PendingAction) -> bool {
        if action.trip_id != self.view.trip_id {
            tracing::debug!(action_id = %action.id, "optimistic update for another trip ignored");
            return false;
        }

        let snapshot = match &action.mutation {
            Mutation::AddTask {
                placeholder_id,
                description,
            } => {
                self.view.tasks.push(Task {
                    id: placeholder_id.clone(),
                    description: description.clone(),
                    completed: false,
                });
                Some(Snapshot::Inserted {
                    placeholder_id: placeholder_id.clone(),
                })
            }
            Mutation::AddChecklistItem {
                placeholder_id,
                text,
            } => {
                self.view.checklist.push(ChecklistItem {
                    id: placeholder_id.clone(),
                    text: text.clone(),
                    checked: false,
                });
                Some(Snapshot::Inserted {
                    placeholder_id: placeholder_id.clone(),
                })
            }
            Mutation::AddGuest {
                placeholder_id,
                name,
            } => {
                self.view.guests.push(Guest {
                    id: placeholder_id.clone(),
                    name: name.clone(),
                    link: None,
                });
                Some(Snapshot::Inserted {
                    placeholder_id: placeholder_id.clone(),
                })
            }
            Mutation::SetTaskCompleted { task_id, completed } => {
                self.modify(task_id, |entity| {
                    if let RemoteEntity::Task(task) = entity {
                        task.completed = *completed;
                    }
                })
            }
            Mutation::SetChecklistItemChecked { item_id, checked } => {
                self.modify(item_id, |entity| {
                    if let RemoteEntity::ChecklistItem(item) = entity {
                        item.checked = *checked;
                    }
                })
            }
            Mutation::RenameGuest { guest_id, name } => self.modify(guest_id, |entity| {
                if let RemoteEntity::Guest(guest) = entity {
                    guest.name = name.clone();
                }
            }),
            Mutation::DeleteTask { task_id: id }
            | Mutation::DeleteChecklistItem { item_id: id }
            | Mutation::DeleteGuest { guest_id: id } => self
                .view
                .remove(id)
                .map(|(index, prior)| Snapshot::Removed { index, prior }),
            Mutation::SaveTripDraft { draft } => {
                let prior = std::mem::replace(&mut self.view.draft, draft.clone());
                Some(Snapshot::Draft { prior })
            }
        };

        match snapshot {
            Some(snapshot) => {
                self.snapshots.insert(action.id, snapshot);
                true
            }
            None => false,
        }
    }

    fn modify(&mut self, id: &str, change: impl FnOnce(&mut RemoteEntity)) -> Option<Snapshot> {
        let prior = self.view.find(id)?;
        let mut updated = prior.clone();
        change(&mut updated);
        self.view.replace(id, updated);
        Some(Snapshot::Replaced { prior })
    }

    /// Reconcile the view with an outcome. Returns `true` once the action's
    /// snapshot is retired (success or terminal failure).
    pub fn settle(&mut self, action_id: &ActionId, outcome: &ActionOutcome) -> bool {
        if !outcome.is_terminal() {
            return false;
        }
        let Some(snapshot) = self.snapshots.remove(action_id) else {
            return false;
        };

        match outcome {
            ActionOutcome::Succeeded(server) => self.confirm(snapshot, server.clone()),
            _ => self.rollback(snapshot),
        }
        true
    }

    fn confirm(&mut self, snapshot: Snapshot, server: Option<RemoteEntity>) {
        let Some(entity) = server else {
            return;
        };
        match snapshot {
            Snapshot::Inserted { placeholder_id } => {
                let server_id = entity.id().to_string();
                if self.view.replace(&placeholder_id, entity) {
                    tracing::debug!(%placeholder_id, %server_id, "placeholder confirmed");
                }
            }
            Snapshot::Replaced { prior } => {
                self.view.replace(prior.id(), entity);
            }
            Snapshot::Removed { .. } | Snapshot::Draft { .. } => {}
        }
    }

    fn rollback(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Inserted { placeholder_id } => {
                self.view.remove(&placeholder_id);
            }
            Snapshot::Replaced { prior } => {
                let id = prior.id().to_string();
                self.view.replace(&id, prior);
            }
            Snapshot::Removed { index, prior } => self.view.insert_at(index, prior),
            Snapshot::Draft { prior } => self.view.draft = prior,
        }
    }

    /// Check if an action still has an unsettled optimistic change
    pub fn has_optimistic_update(&self, action_id: &ActionId) -> bool {
        self.snapshots.contains_key(action_id)
    }

    /// Get the count of pending optimistic updates
    pub fn count_pending(&self) -> usize {
        self.snapshots.len()
    }
}
