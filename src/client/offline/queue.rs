//! # Persistent Queue
//!
//! Durable list of pending actions that survives a restart.
//!
//! ## Features
//!
//! - **Persistence**: every mutation rewrites the backing [`QueueStorage`]
//! - **Replay Order**: snapshots are sorted by `enqueued_at`, oldest first
//! - **Corruption Tolerance**: unreadable or malformed data loads as empty
//! - **Stale Cleanup**: actions older than a cutoff are dropped at load
//! - **Id Remap**: queued actions can be re-pointed from a placeholder id
//!   to the id the server assigned
//!
//! ## Usage
//!
//! ```rust,ignore
//! let storage = Arc::new(FileStorage::new(config.queue_path.clone()));
//! let mut queue = PersistentQueue::load(storage);
//! queue.cleanup_stale(config.stale_after);
//!
//! queue.push(PendingAction::new("trip-1", Mutation::add_checklist_item("Sunscreen")));
//! for action in queue.snapshot() {
//!     // dispatch...
//!     queue.remove(&action.id);
//! }
//! ```

use crate::client::offline::action::{ActionId, PendingAction};
use crate::client::offline::storage::QueueStorage;
use std::sync::Arc;
use std::time::Duration;

/// Pending actions plus the store they are mirrored to
#[derive(Debug)]
pub struct PersistentQueue {
    actions: Vec<PendingAction>,
    storage: Arc<dyn QueueStorage>,
}

impl PersistentQueue {
    /// Empty queue; the store is left untouched until the first mutation.
    pub fn new(storage: Arc<dyn QueueStorage>) -> Self {
        Self {
            actions: Vec::new(),
            storage,
        }
    }

    /// Read the persisted list. Missing or corrupt data yields an empty queue.
    pub fn load(storage: Arc<dyn QueueStorage>) -> Self {
        let actions = match storage.read() {
            Ok(Some(contents)) if !contents.trim().is_empty() => {
                match serde_json::from_str::<Vec<PendingAction>>(&contents) {
                    Ok(mut actions) => {
                        actions.sort_by_key(|action| action.enqueued_at);
                        actions
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "discarding corrupt pending action queue");
                        Vec::new()
                    }
                }
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "pending action queue unreadable, starting empty");
                Vec::new()
            }
        };

        tracing::debug!(count = actions.len(), "loaded pending action queue");
        Self { actions, storage }
    }

    /// Append an action
    pub fn push(&mut self, action: PendingAction) {
        self.actions.push(action);
        self.persist();
    }

    pub fn get(&self, id: &ActionId) -> Option<&PendingAction> {
        self.actions.iter().find(|action| action.id == *id)
    }

    /// Mutate one action in place and persist; `false` if it is gone.
    pub fn update<F>(&mut self, id: &ActionId, f: F) -> bool
    where
        F: FnOnce(&mut PendingAction),
    {
        match self.actions.iter_mut().find(|action| action.id == *id) {
            Some(action) => {
                f(action);
                self.persist();
                true
            }
            None => false,
        }
    }

    /// Remove after a terminal outcome
    pub fn remove(&mut self, id: &ActionId) -> Option<PendingAction> {
        let index = self.actions.iter().position(|action| action.id == *id)?;
        let action = self.actions.remove(index);
        self.persist();
        Some(action)
    }

    /// Remove every action matching `predicate`, returning them in queue order.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<PendingAction>
    where
        F: FnMut(&PendingAction) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.actions)
            .into_iter()
            .partition(|action| predicate(action));
        self.actions = kept;
        if !removed.is_empty() {
            self.persist();
        }
        removed
    }

    /// Copy of the queue in replay order
    pub fn snapshot(&self) -> Vec<PendingAction> {
        let mut actions = self.actions.clone();
        // stable: equal timestamps keep append order
        actions.sort_by_key(|action| action.enqueued_at);
        actions
    }

    /// Actions of one trip, in replay order
    pub fn for_trip(&self, trip_id: &str) -> Vec<PendingAction> {
        self.snapshot()
            .into_iter()
            .filter(|action| action.trip_id == trip_id)
            .collect()
    }

    /// Whether anything queued touches `entity_id` (server or placeholder id).
    pub fn touches(&self, trip_id: &str, entity_id: &str) -> bool {
        self.actions
            .iter()
            .any(|action| action.trip_id == trip_id && action.entity_ref() == entity_id)
    }

    /// Whether the add that mints `placeholder_id` is still queued.
    pub fn has_pending_add(&self, trip_id: &str, placeholder_id: &str) -> bool {
        self.actions.iter().any(|action| {
            action.trip_id == trip_id && action.mutation.placeholder_id() == Some(placeholder_id)
        })
    }

    /// Re-point queued actions from a placeholder to the server id.
    pub fn retarget(&mut self, trip_id: &str, placeholder_id: &str, server_id: &str) -> usize {
        let changed = self
            .actions
            .iter_mut()
            .filter(|action| action.trip_id == trip_id)
            .map(|action| action.retarget(placeholder_id, server_id))
            .filter(|changed| *changed)
            .count();
        if changed > 0 {
            self.persist();
        }
        changed
    }

    /// Drop actions enqueued more than `max_age` ago. Nobody is notified.
    pub fn cleanup_stale(&mut self, max_age: Duration) -> Vec<PendingAction> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = chrono::Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

        let stale = self.remove_where(|action| action.enqueued_at < cutoff);
        if !stale.is_empty() {
            tracing::warn!(count = stale.len(), "dropped stale pending actions");
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            total: self.actions.len(),
            retrying: self.actions.iter().filter(|a| a.attempts > 0).count(),
        }
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.actions)
            .map_err(Into::into)
            .and_then(|json| self.storage.write(&json));
        if let Err(e) = result {
            // the in-memory queue stays authoritative until the next write
            tracing::warn!(error = %e, "failed to persist pending action queue");
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Actions waiting in the queue
    pub total: usize,
    /// Actions that failed at least once
    pub retrying: usize,
}
