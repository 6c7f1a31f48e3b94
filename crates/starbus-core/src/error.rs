//! Error types for the property bus.

use thiserror::Error;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Error type for bus operations.
///
/// Every public operation on the bus returns one of these instead of
/// panicking; hardware and protocol failures are reported to clients
/// through property state, never through a separate error channel.
#[derive(Debug, Error)]
pub enum BusError {
    /// Operation failed; no partial object is retained.
    #[error("operation failed: {0}")]
    Failed(String),

    /// Device, property or item lookup failed.
    #[error("not found: {0}")]
    NotFound(String),

    /// A device or property with the same name is already attached.
    #[error("duplicated: {0}")]
    Duplicated(String),

    /// The advisory hardware lock is held by another process.
    #[error("resource is locked: {0}")]
    Locked(String),

    /// A change is already in progress for this property.
    #[error("property is busy: {0}")]
    Busy(String),

    /// Instance count change refused.
    #[error("instance change refused: {0}")]
    InstanceRefused(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    /// Shorthand for a generic failure with a formatted message.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
