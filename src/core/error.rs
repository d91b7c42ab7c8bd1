//! Error types for the walkthrough engine.
//!
//! Only programming errors (an unknown tour id) surface to callers. Storage
//! failures are converted to `StorageError` at the store boundary and then
//! swallowed by the persistence helpers.

use thiserror::Error;

/// Result type alias for walkthrough operations.
pub type Result<T> = std::result::Result<T, WalkthroughError>;

/// Unified error type for orchestrator and configuration operations.
#[derive(Debug, Error)]
pub enum WalkthroughError {
    /// `start_tour_by_id` was called with an id that is not in the registry.
    #[error("Tour not registered: {0}")]
    NotRegistered(String),

    /// Persistent or session store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A tour module loader failed.
    #[error("Failed to load tours from '{specifier}': {reason}")]
    Load { specifier: String, reason: String },

    /// Invalid configuration document.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WalkthroughError {
    pub fn load(specifier: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Load {
            specifier: specifier.into(),
            reason: reason.to_string(),
        }
    }
}

/// Error type for key-value store backends.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The store does not exist in this host (private mode, no window).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the operation (quota exceeded, security error).
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded.
    #[error("Storage serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_registered_message() {
        let err = WalkthroughError::NotRegistered("intro".to_string());
        assert_eq!(err.to_string(), "Tour not registered: intro");
    }

    #[test]
    fn test_storage_error_converts() {
        let err: WalkthroughError = StorageError::Backend("QuotaExceededError".into()).into();
        assert!(err.to_string().contains("QuotaExceededError"));
    }

    #[test]
    fn test_load_error_message() {
        let err = WalkthroughError::load("./tours.json", "not found");
        assert_eq!(
            err.to_string(),
            "Failed to load tours from './tours.json': not found"
        );
    }
}
