//! Placeholder → server id table.
//!
//! Filled when an add is confirmed. Mutations submitted afterwards that
//! still name the placeholder (the UI had not caught up yet) are resolved
//! against it before they are queued. Entries older than `max_age` are
//! dropped whenever a new one is recorded.

use crate::client::offline::action::Mutation;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct IdRemap {
    max_age: Duration,
    resolved: HashMap<String, (String, Instant)>,
}

impl IdRemap {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            resolved: HashMap::new(),
        }
    }

    pub fn record(&mut self, placeholder_id: &str, server_id: &str, now: Instant) {
        self.prune(now);
        self.resolved
            .insert(placeholder_id.to_string(), (server_id.to_string(), now));
    }

    /// Drop entries recorded more than `max_age` before `now`.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.resolved.len();
        let max_age = self.max_age;
        self.resolved
            .retain(|_, (_, recorded)| now.saturating_duration_since(*recorded) <= max_age);
        before - self.resolved.len()
    }

    pub fn resolve(&self, id: &str) -> Option<&str> {
        self.resolved.get(id).map(|(server_id, _)| server_id.as_str())
    }

    /// Rewrite the mutation's target if it names a resolved placeholder.
    pub fn apply(&self, mutation: &mut Mutation) -> bool {
        let Some(server_id) = mutation.entity_id().and_then(|id| self.resolve(id)) else {
            return false;
        };
        let server_id = server_id.to_string();
        let target = match mutation {
            Mutation::SetTaskCompleted { task_id, .. } | Mutation::DeleteTask { task_id } => task_id,
            Mutation::SetChecklistItemChecked { item_id, .. }
            | Mutation::DeleteChecklistItem { item_id } => item_id,
            Mutation::RenameGuest { guest_id, .. } | Mutation::DeleteGuest { guest_id } => guest_id,
            _ => return false,
        };
        *target = server_id;
        true
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}
