//! Error types for queue operations.

use crate::queue::PendingEntry;
use std::time::Duration;
use thiserror::Error;

/// Error type for every queue operation exposed to producers and consumers
#[derive(Debug, Error)]
pub enum QueueError {
    /// The producer's message could not be encoded; nothing was stored
    #[error("Serialization failed: {0}")]
    Serialization(#[source] CodecError),

    /// A claimed payload could not be decoded.
    ///
    /// The raw payload stays in the processing list. The attached entry can be
    /// passed to `ReliableQueue::discard` to drop it.
    #[error("Deserialization of claimed message failed: {source}")]
    Deserialization {
        #[source]
        source: CodecError,
        entry: PendingEntry,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cancellation was observed while waiting for a message
    #[error("Queue is shutting down")]
    ShuttingDown,

    #[error("Message was claimed from '{actual}' and cannot be settled on '{expected}'")]
    ForeignMessage { expected: String, actual: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl QueueError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Serialization(_) => false,
            Self::Deserialization { .. } => false,
            Self::Storage(e) => e.is_transient(),
            Self::ShuttingDown => false,
            Self::ForeignMessage { .. } => false,
            Self::Validation(_) => false,
            Self::Configuration(_) => false,
        }
    }

    /// Check if error should be retried
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }

    /// Get suggested retry delay
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Storage(StorageError::ConnectionFailed { .. }) => Some(Duration::from_secs(5)),
            Self::Storage(StorageError::TransactionAborted { .. }) => Some(Duration::from_secs(1)),
            Self::Storage(StorageError::CommandFailed { .. }) => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    /// The undecodable processing-list entry carried by a deserialization failure
    pub fn pending_entry(&self) -> Option<&PendingEntry> {
        match self {
            Self::Deserialization { entry, .. } => Some(entry),
            _ => None,
        }
    }
}

/// Failures talking to the list storage service
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Command {command} failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Transaction aborted: {message}")]
    TransactionAborted { message: String },

    #[error("Unexpected reply to {command}: {message}")]
    UnexpectedReply { command: String, message: String },
}

impl StorageError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::PoolClosed => false,
            Self::CommandFailed { .. } => true,
            Self::TransactionAborted { .. } => true,
            Self::UnexpectedReply { .. } => false,
        }
    }
}

/// Errors during message encoding/decoding
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON codec failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message body is not valid UTF-8")]
    InvalidUtf8,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
