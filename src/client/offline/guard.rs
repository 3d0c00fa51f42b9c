//! # In-Flight Guard
//!
//! Collapses duplicate concurrent requests on the same logical target.
//! An entry exists exactly while a request for its key is outstanding; the
//! dispatcher releases it from a drop guard so it is never left behind.

use crate::client::offline::action::{ActionKind, TargetType};
use std::collections::HashSet;

/// `(kind, target, trip, entity-or-placeholder)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuardKey {
    kind: ActionKind,
    target: TargetType,
    trip_id: String,
    entity: String,
}

impl GuardKey {
    pub fn new(kind: ActionKind, target: TargetType, trip_id: &str, entity: &str) -> Self {
        Self {
            kind,
            target,
            trip_id: trip_id.to_string(),
            entity: entity.to_string(),
        }
    }

    /// Key shared by direct and queued draft saves of one trip
    pub fn trip_draft(trip_id: &str) -> Self {
        Self::new(ActionKind::Update, TargetType::TripDraft, trip_id, trip_id)
    }
}

/// Set of outstanding request keys
#[derive(Debug, Default)]
pub struct InFlightGuard {
    entries: HashSet<GuardKey>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if the caller may issue the request; `false` if an identical
    /// one is already outstanding.
    pub fn try_acquire(&mut self, key: &GuardKey) -> bool {
        self.entries.insert(key.clone())
    }

    pub fn release(&mut self, key: &GuardKey) {
        self.entries.remove(key);
    }

    pub fn is_held(&self, key: &GuardKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
