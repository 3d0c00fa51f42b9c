//! Shared Error Types
//!
//! Error types used by the sync core and by the REST client it drives.
//!
//! # Error Categories
//!
//! - `Network` - no HTTP response at all (connect failure, timeout, offline)
//! - `Remote` - the API answered with a non-success status
//! - `Serialization` - JSON encoding/decoding failures
//! - `Storage` - the persisted queue could not be read or written
//! - `Orphaned` - an action whose placeholder add was abandoned
//!
//! `SyncError` is `Clone` so one outcome can be delivered both to the
//! per-action receipt and to every event subscriber.
//!
//! # Usage
//!
//! ```rust
//! use planner_sync::shared::error::SyncError;
//!
//! let error = SyncError::remote(429, "slow down");
//! assert!(error.is_throttle());
//! assert!(!error.is_network());
//! ```
use thiserror::Error;

/// Result alias used throughout the sync core
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Failures observed while talking to the trip API or the local queue store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No response from the server
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// The server rejected the request
    #[error("Remote error ({status}): {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// Persisted queue could not be read or written
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message
        message: String,
    },

    /// The add this action depends on will never be confirmed
    #[error("Orphaned action: {message}")]
    Orphaned {
        /// Human-readable error message
        message: String,
    },
}

impl SyncError {
    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new remote rejection
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new orphaned-action error
    pub fn orphaned(message: impl Into<String>) -> Self {
        Self::Orphaned {
            message: message.into(),
        }
    }

    /// Whether the failure means "no connectivity" rather than a rejection.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Conflict or rate limit (409/429).
    pub fn is_throttle(&self) -> bool {
        matches!(self.status_code(), Some(409) | Some(429))
    }

    /// HTTP status if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::remote(status.as_u16(), err.to_string())
        } else if err.is_decode() {
            Self::serialization(err.to_string())
        } else {
            // connect, timeout, request and body errors all mean we never got an answer
            Self::network(err.to_string())
        }
    }
}

/// Errors from the sync service lifecycle
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// `start` was called while the background task is alive
    #[error("sync service is already running")]
    AlreadyRunning,

    /// `start` was called outside a tokio runtime
    #[error("sync service must be started within a tokio runtime")]
    NoRuntime,
}
