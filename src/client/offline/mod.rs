//! # Offline Action Queue
//!
//! Offline-first mutation handling for trips: optimistic local updates, a
//! durable queue of pending actions, and replay against the REST API when
//! connectivity returns.
//!
//! ## Architecture
//!
//! - **Optimistic UI**: immediate local changes, confirmed or rolled back
//! - **Persistent Queue**: pending actions survive a restart
//! - **Dispatcher**: replays the queue and owns the direct draft-save path
//! - **Retry Logic**: fixed attempt ceiling, per-trip cooldowns with backoff
//!
//! ## Key Components
//!
//! - `action.rs`: pending actions, mutations and outcomes
//! - `queue.rs` / `storage.rs`: persistence
//! - `guard.rs`: in-flight de-duplication
//! - `retry.rs`: retry ceiling and cooldowns
//! - `remap.rs`: placeholder to server id resolution
//! - `dispatcher.rs`: drain cycles and direct saves
//! - `optimistic.rs`: local view reconciliation
//!
//! ## Usage
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(&config, api, storage, monitor);
//!
//! let mut events = dispatcher.subscribe();
//! let submission = dispatcher.submit("trip-1", Mutation::add_checklist_item("Sunscreen"));
//! if let Submission::Accepted(receipt) = &submission {
//!     optimistic.apply(receipt.action());
//! }
//!
//! // snapshots are keyed by the id every event carries
//! while let Ok(event) = events.recv().await {
//!     optimistic.settle(&event.action_id, &event.outcome);
//! }
//! ```

pub mod action;
pub mod dispatcher;
pub mod guard;
pub mod optimistic;
pub mod queue;
pub mod remap;
pub mod retry;
pub mod storage;

// Re-export main types
pub use action::{ActionId, ActionKind, ActionOutcome, Mutation, PendingAction, TargetType};
pub use dispatcher::{ActionReceipt, Dispatcher, DraftSave, DrainReport, Submission, SyncEvent};
pub use guard::{GuardKey, InFlightGuard};
pub use optimistic::{OptimisticManager, TripView};
pub use queue::{PersistentQueue, QueueStats};
pub use remap::IdRemap;
pub use retry::{Backoff, CooldownTracker, RetryDecision, RetryPolicy};
pub use storage::{FileStorage, MemoryStorage, QueueStorage};
