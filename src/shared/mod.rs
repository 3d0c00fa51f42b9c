//! Shared Module
//!
//! Types that are independent of the sync machinery: trip entities as the
//! REST API serializes them, error types, and configuration.

/// Trip sub-entities and placeholder ids
pub mod trip;

/// Shared error types
pub mod error;

/// Sync configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
pub use error::{ServiceError, SyncError, SyncResult};
pub use trip::{ChecklistItem, Guest, RemoteEntity, Task, TripDraft};
