//! # Sync Metrics
//!
//! Cumulative counters over the lifetime of a dispatcher.
//!
//! ## Features
//!
//! - **Drain Tracking**: number of drain cycles and how long the last took
//! - **Outcome Counts**: successes, failed attempts, abandonments, offline
//!   deferrals and direct-save fallbacks

use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncMetrics {
    pub total_drains: u64,
    pub succeeded: u64,
    /// Failed remote attempts, terminal or not
    pub failed_attempts: u64,
    pub abandoned: u64,
    /// Outcomes reported as `Offline`
    pub deferred: u64,
    /// Direct draft saves that fell back to the queue
    pub draft_fallbacks: u64,
    pub last_drain_duration: Option<Duration>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_drain(&mut self, duration: Duration) {
        self.total_drains += 1;
        self.last_drain_duration = Some(duration);
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, terminal: bool) {
        self.failed_attempts += 1;
        if terminal {
            self.abandoned += 1;
        }
    }

    /// A dependent of an abandoned add; never attempted.
    pub fn record_orphaned(&mut self) {
        self.abandoned += 1;
    }

    pub fn record_deferred(&mut self) {
        self.deferred += 1;
    }

    pub fn record_draft_fallback(&mut self) {
        self.draft_fallbacks += 1;
    }

    /// Share of remote attempts that succeeded
    pub fn success_rate(&self) -> f64 {
        let attempts = self.succeeded + self.failed_attempts;
        if attempts == 0 {
            0.0
        } else {
            self.succeeded as f64 / attempts as f64
        }
    }
}
