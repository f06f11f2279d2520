//! Queue identifiers and the storage keys derived from them.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Namespace used for list keys when none is configured
pub const DEFAULT_NAMESPACE: &str = "shove";

const PENDING_SUFFIX: &str = "pending";

/// Validated queue id with length and character restrictions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueId(String);

impl QueueId {
    /// Create new queue id with validation
    pub fn new(id: String) -> Result<Self, ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::Required {
                field: "queue_id".to_string(),
            });
        }
        if id.len() > 260 {
            return Err(ValidationError::OutOfRange {
                field: "queue_id".to_string(),
                message: "must be at most 260 characters".to_string(),
            });
        }

        // ':' separates key segments, so it is never allowed inside an id
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_id".to_string(),
                message: "only ASCII alphanumeric, '-', '_' and '.' allowed".to_string(),
            });
        }

        Ok(Self(id))
    }

    /// Get queue id as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// The pair of list keys backing one queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListKeys {
    main: String,
    pending: String,
}

impl ListKeys {
    /// Derive `<namespace>:<id>` and `<namespace>:<id>:pending`
    pub fn derive(namespace: &str, id: &QueueId) -> Self {
        let main = format!("{}:{}", namespace, id.as_str());
        let pending = format!("{}:{}", main, PENDING_SUFFIX);
        Self { main, pending }
    }

    /// Key of the list holding messages awaiting claim
    pub fn main(&self) -> &str {
        &self.main
    }

    /// Key of the list holding claimed, unacknowledged messages
    pub fn pending(&self) -> &str {
        &self.pending
    }
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
