//! Client-side sync core
//!
//! - `offline` - pending-action queue, dispatcher and optimistic view state
//! - `sync` - background service, network monitor, scheduler and autosave
//! - `trip_api` - REST client seam
//! - `config` - client configuration and session token

pub mod config;
pub mod offline;
pub mod sync;
pub mod trip_api;

pub use config::Config;
pub use offline::{ActionOutcome, Dispatcher, Mutation, PendingAction, Submission, SyncEvent};
pub use sync::{SyncService, SyncStatus};
pub use trip_api::{HttpTripApi, TripApi};
