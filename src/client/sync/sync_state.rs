//! # Sync State
//!
//! Point-in-time snapshot of the sync service for status indicators.

use crate::client::sync::metrics::SyncMetrics;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    /// Background loop is running
    pub is_running: bool,
    /// A drain cycle is in progress
    pub is_syncing: bool,
    pub is_online: bool,
    /// Actions waiting in the persistent queue
    pub pending_actions: usize,
    /// Queued actions that failed at least once
    pub retrying_actions: usize,
    /// End of the last completed drain
    pub last_drain: Option<DateTime<Utc>>,
    pub metrics: SyncMetrics,
}

impl SyncStatus {
    /// Nothing left to send
    pub fn is_idle(&self) -> bool {
        !self.is_syncing && self.pending_actions == 0
    }
}
