//! # Reliable Queue
//!
//! At-least-once message queue on top of an ordered-list store (Redis or the
//! in-memory store), built for a message-dispatch service.
//!
//! This library provides:
//! - FIFO enqueue and blocking, cancellable dequeue
//! - Crash-safe claims: a claimed message is kept in a processing list until
//!   it is acknowledged or requeued
//! - Startup recovery of claims orphaned by an unclean shutdown
//! - A shared, explicitly owned connection pool
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`keys`] - Queue ids and the list keys derived from them
//! - [`codec`] - Message encoding
//! - [`storage`] - List storage capability and its backends
//! - [`pool`] - Connection pool
//! - [`cancel`] - Cooperative cancellation
//! - [`client`] - Traits exposed to the dispatch service
//! - [`queue`] - The reliable queue
//! - [`factory`] - Queue construction and recovery
//! - [`config`] - Settings
//!
//! ## Operational requirement
//!
//! Recovery moves every claimed-but-unsettled message back to the main list
//! when a queue is created. Only one process may consume a given queue id at
//! a time, otherwise recovery would re-deliver messages another live consumer
//! is still processing.
//!
//! ## Example
//!
//! ```rust,no_run
//! use reliable_queue::{cancellation, MemoryStore, QueueSettings, ReliableQueueFactory};
//!
//! # async fn run() -> Result<(), reliable_queue::QueueError> {
//! let store = MemoryStore::new();
//! let factory = ReliableQueueFactory::new(store.connector(), QueueSettings::default())?;
//! let queue = factory.new_queue::<String>("apns").await?;
//!
//! queue.enqueue(&"hello".to_string()).await?;
//!
//! let (_canceller, signal) = cancellation();
//! let claimed = queue.dequeue(&signal).await?;
//! queue.acknowledge(&claimed).await?;
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod factory;
pub mod keys;
pub mod pool;
pub mod queue;
pub mod storage;

// Re-export commonly used types at crate root for convenience
pub use cancel::{cancellation, CancellationSignal, Canceller};
pub use client::{MessageQueue, QueueFactory};
pub use codec::{JsonCodec, MessageCodec};
pub use config::{PoolConfig, QueueSettings};
pub use error::{CodecError, ConfigurationError, QueueError, StorageError, ValidationError};
pub use factory::ReliableQueueFactory;
pub use keys::{ListKeys, QueueId, DEFAULT_NAMESPACE};
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use queue::{PendingEntry, QueueStats, QueuedMessage, ReliableQueue};
pub use storage::{
    Connector, ListCommand, ListConnection, MemoryConnection, MemoryConnector, MemoryStore,
};

#[cfg(feature = "redis")]
pub use storage::{RedisConnection, RedisConnector};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
