//! Error types for DocVault
//!
//! Provides a unified error type for all operations.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using VaultError
pub type Result<T> = std::result::Result<T, VaultError>;

/// Unified error type for DocVault operations
#[derive(Debug, Error)]
pub enum VaultError {
    // -------------------------------------------------------------------------
    // Key Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key segment {segment:?}: {reason}")]
    Validation { segment: String, reason: &'static str },

    // -------------------------------------------------------------------------
    // Document Errors
    // -------------------------------------------------------------------------
    #[error("Document not found: {key}")]
    NotFound { key: String },

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Timed out after {timeout:?} waiting for lock on {key}")]
    LockTimeout { key: String, timeout: Duration },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    pub(crate) fn invalid(segment: &str, reason: &'static str) -> Self {
        VaultError::Validation {
            segment: segment.to_string(),
            reason,
        }
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound { .. })
    }

    /// True for `LockTimeout`
    pub fn is_timeout(&self) -> bool {
        matches!(self, VaultError::LockTimeout { .. })
    }

    /// True for `Validation`
    pub fn is_validation(&self) -> bool {
        matches!(self, VaultError::Validation { .. })
    }
}
