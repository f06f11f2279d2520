//! Ordered-list storage capability consumed by the reliable queue.
//!
//! The queue needs exactly five list primitives plus atomic batches of them.
//! Backends implement [`ListConnection`] for a single connection and
//! [`Connector`] for dialing new ones; the pool hands connections out.
//!
//! - [`memory`] - process-local store with fault injection, for tests and development
//! - `redis` - Redis/Valkey backend (cargo feature `redis`)

use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

pub use memory::{MemoryConnection, MemoryConnector, MemoryStore};

#[cfg(feature = "redis")]
pub use self::redis::{RedisConnection, RedisConnector};

/// One command inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListCommand {
    /// Append `value` to the tail of `key`
    PushBack { key: String, value: Bytes },

    /// Remove up to `count` occurrences of `value` from `key`, head first
    Remove {
        key: String,
        count: usize,
        value: Bytes,
    },
}

impl ListCommand {
    /// Storage command name, used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::PushBack { .. } => "RPUSH",
            Self::Remove { .. } => "LREM",
        }
    }
}

/// A single connection to an ordered-list store
#[async_trait]
pub trait ListConnection: Send + 'static {
    /// Append to the tail of `key`, returning the new length
    async fn push_back(&mut self, key: &str, value: &[u8]) -> Result<usize, StorageError>;

    /// Move the head of `source` to the tail of `destination`, waiting up to
    /// `timeout` for `source` to become non-empty.
    ///
    /// Returns `None` when the wait elapses.
    async fn blocking_move(
        &mut self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<Bytes>, StorageError>;

    /// Move the head of `source` to the tail of `destination` without waiting
    async fn move_front_to_back(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<Option<Bytes>, StorageError>;

    /// Remove up to `count` occurrences of `value`, returning how many were removed
    async fn remove(&mut self, key: &str, count: usize, value: &[u8])
        -> Result<usize, StorageError>;

    /// Length of the list at `key`; missing keys are empty
    async fn len(&mut self, key: &str) -> Result<usize, StorageError>;

    /// Execute all commands or none of them.
    ///
    /// Returns one integer reply per command, in order.
    async fn atomic(&mut self, commands: &[ListCommand]) -> Result<Vec<i64>, StorageError>;
}

/// Dials new connections for the pool
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: ListConnection;

    async fn connect(&self) -> Result<Self::Connection, StorageError>;
}
