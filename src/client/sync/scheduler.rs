//! # Drain Scheduler
//!
//! Periodic timer that drives background drains while online.
//!
//! ## Features
//!
//! - **Fixed Period**: one tick per `drain_interval` (30 s by default)
//! - **No Bursts**: ticks missed while a drain was running are not replayed

use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Synchronization scheduler
#[derive(Debug, Clone, Copy)]
pub struct DrainScheduler {
    interval: Duration,
}

impl DrainScheduler {
    /// Create a new drain scheduler
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Interval whose first tick fires one period from now.
    pub fn ticker(&self) -> Interval {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}
