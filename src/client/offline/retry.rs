//! # Retry Ceiling and Cooldowns
//!
//! Two pieces of timing policy used by the dispatcher.
//!
//! ## Features
//!
//! - **Retry Ceiling**: a queued action is abandoned once it has failed
//!   `max_attempts` times; every earlier failure keeps it queued
//! - **Cooldown**: minimum gap between direct requests for one resource
//! - **Backoff**: 409/429 answers stretch the cooldown exponentially up to a
//!   ceiling; a success resets it

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// What to do with an action after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep it queued for the next drain
    Retry { attempts: u32 },
    /// Report a terminal failure and drop it
    Abandon { attempts: u32 },
}

/// Fixed attempt ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide after a failure, given how many attempts had failed before it.
    pub fn on_failure(&self, previous_attempts: u32) -> RetryDecision {
        let attempts = previous_attempts.saturating_add(1);
        if attempts >= self.max_attempts {
            RetryDecision::Abandon { attempts }
        } else {
            RetryDecision::Retry { attempts }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Exponential cooldown window: `base * 2^strikes`, capped at `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Window length after `strikes` consecutive throttled answers
    pub fn delay(&self, strikes: u32) -> Duration {
        let factor = 2u32.checked_pow(strikes).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

#[derive(Debug, Clone, Copy)]
struct Cooldown {
    last_request: Instant,
    strikes: u32,
}

/// Per-resource cooldown windows, process lifetime only
#[derive(Debug)]
pub struct CooldownTracker {
    backoff: Backoff,
    entries: HashMap<String, Cooldown>,
}

impl CooldownTracker {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            entries: HashMap::new(),
        }
    }

    /// Time left before `key` may be requested again; `None` if it may go now.
    pub fn remaining(&self, key: &str, now: Instant) -> Option<Duration> {
        let entry = self.entries.get(key)?;
        let window = self.backoff.delay(entry.strikes);
        let elapsed = now.saturating_duration_since(entry.last_request);
        if elapsed >= window {
            None
        } else {
            Some(window - elapsed)
        }
    }

    /// A request for `key` is being issued at `now`.
    pub fn record_request(&mut self, key: &str, now: Instant) {
        self.entries
            .entry(key.to_string())
            .and_modify(|entry| entry.last_request = now)
            .or_insert(Cooldown {
                last_request: now,
                strikes: 0,
            });
    }

    /// The server answered 409/429; widen the next window.
    pub fn record_throttled(&mut self, key: &str) -> Duration {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.strikes = entry.strikes.saturating_add(1);
                self.backoff.delay(entry.strikes)
            }
            None => self.backoff.delay(0),
        }
    }

    pub fn record_success(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.strikes = 0;
        }
    }
}
