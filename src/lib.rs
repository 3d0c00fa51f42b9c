//! plann.er Sync - Main Library
//!
//! Client-side offline action queue and synchronization service for
//! plann.er, the collaborative trip planner. Mutations to a trip's tasks,
//! packing checklist and guest list are applied optimistically, persisted,
//! and replayed against the REST API when connectivity allows.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared by every layer
//!   - Trip entities as the API returns them
//!   - Error types
//!   - Sync configuration
//!
//! - **`client`** - The sync core
//!   - Persistent pending-action queue and dispatcher
//!   - Optimistic view state
//!   - Background sync service, network monitor, draft autosave
//!   - REST client behind the `TripApi` trait
//!
//! # Usage
//!
//! ```rust,no_run
//! use planner_sync::client::offline::{ActionOutcome, MemoryStorage, Mutation, Submission};
//! use planner_sync::client::{Config, HttpTripApi, SyncService};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let api = Arc::new(HttpTripApi::new(config.clone())?);
//! let mut service = SyncService::new(config.sync().clone(), api, Arc::new(MemoryStorage::new()));
//! service.start()?;
//!
//! let mutation = Mutation::add_checklist_item("Sunscreen");
//! if let Submission::Accepted(receipt) = service.dispatcher().submit("trip-1", mutation) {
//!     if let Some(ActionOutcome::Succeeded(item)) = receipt.settled().await {
//!         println!("confirmed: {:?}", item);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod shared;
