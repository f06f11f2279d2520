//! Crash-safe list queue.
//!
//! Every queue is backed by two lists: the main list, holding messages waiting
//! to be claimed, and the processing list, holding messages claimed by a
//! consumer but not yet settled. A message moves between them only through
//! single atomic storage operations:
//!
//! - claim: head of main list -> tail of processing list (blocking move)
//! - acknowledge: removed from the processing list
//! - requeue: removed from the processing list and appended to the main list
//!   in one transaction
//! - recovery: every processing-list entry back to the main list, run before
//!   a queue handle is handed out
//!
//! A claimed message therefore survives a consumer crash: it stays in the
//! processing list until the next recovery puts it back in line.
//!
//! Recovery cannot tell an orphaned claim from one a live consumer is still
//! working on. At most one process may use a given queue id at a time; the
//! deployment has to guarantee that.

use crate::cancel::CancellationSignal;
use crate::client::MessageQueue;
use crate::codec::{JsonCodec, MessageCodec};
use crate::error::{QueueError, StorageError};
use crate::keys::{ListKeys, QueueId};
use crate::pool::{ConnectionPool, PooledConnection};
use crate::storage::{Connector, ListCommand, ListConnection};
use async_trait::async_trait;
use bytes::Bytes;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

// ============================================================================
// Claimed Messages
// ============================================================================

/// Raw payload of a claimed message, as stored in the processing list.
///
/// Only the queue that produced it can use it; it is located again by value
/// when the message is acknowledged or requeued.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pending_key: String,
    raw: Bytes,
}

impl PendingEntry {
    /// Size of the stored payload in bytes
    pub fn payload_len(&self) -> usize {
        self.raw.len()
    }
}

impl std::fmt::Debug for PendingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingEntry")
            .field("pending_key", &self.pending_key)
            .field("payload_len", &self.raw.len())
            .finish()
    }
}

/// A message claimed by [`ReliableQueue::dequeue`]
#[derive(Debug, Clone)]
pub struct QueuedMessage<T> {
    message: T,
    entry: PendingEntry,
}

impl<T> QueuedMessage<T> {
    pub fn message(&self) -> &T {
        &self.message
    }

    pub fn into_message(self) -> T {
        self.message
    }

    pub fn entry(&self) -> &PendingEntry {
        &self.entry
    }
}

/// Lengths of the two lists of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Messages waiting to be claimed
    pub ready: usize,
    /// Messages claimed but not yet acknowledged or requeued
    pub pending: usize,
}

// ============================================================================
// ReliableQueue
// ============================================================================

/// Handle to one named queue; safe to share between producers and consumers
pub struct ReliableQueue<T, C: Connector, K = JsonCodec> {
    id: QueueId,
    keys: ListKeys,
    pool: Arc<ConnectionPool<C>>,
    codec: K,
    poll_timeout: Duration,
    shutting_down: AtomicBool,
    _message: PhantomData<fn() -> T>,
}

/// Drop connections that failed at the transport level instead of reusing them
fn storage_failure<C: Connector>(conn: &mut PooledConnection<C>, err: StorageError) -> QueueError {
    if matches!(
        err,
        StorageError::ConnectionFailed { .. } | StorageError::UnexpectedReply { .. }
    ) {
        conn.mark_broken();
    }
    QueueError::Storage(err)
}

impl<T, C, K> ReliableQueue<T, C, K>
where
    T: Send + Sync + 'static,
    C: Connector,
    K: MessageCodec<T>,
{
    pub(crate) fn new(
        id: QueueId,
        namespace: &str,
        pool: Arc<ConnectionPool<C>>,
        codec: K,
        poll_timeout: Duration,
    ) -> Self {
        let keys = ListKeys::derive(namespace, &id);
        Self {
            id,
            keys,
            pool,
            codec,
            poll_timeout,
            shutting_down: AtomicBool::new(false),
            _message: PhantomData,
        }
    }

    pub fn id(&self) -> &QueueId {
        &self.id
    }

    pub fn keys(&self) -> &ListKeys {
        &self.keys
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Encode `message` and append it to the tail of the main list
    pub async fn enqueue(&self, message: &T) -> Result<(), QueueError> {
        let raw = self
            .codec
            .encode(message)
            .map_err(QueueError::Serialization)?;

        let mut conn = self.pool.get().await?;
        conn.push_back(self.keys.main(), &raw)
            .await
            .map_err(|e| storage_failure(&mut conn, e))?;

        debug!(queue = %self.id, bytes = raw.len(), "Enqueued message");
        Ok(())
    }

    /// Claim the head of the main list into the processing list.
    ///
    /// Each attempt waits at most the poll timeout; `cancel`, shutdown and a
    /// closed pool are checked between attempts. A message claimed before cancellation is
    /// noticed is returned normally.
    pub async fn dequeue(
        &self,
        cancel: &CancellationSignal,
    ) -> Result<QueuedMessage<T>, QueueError> {
        if self.should_stop(cancel) {
            return Err(QueueError::ShuttingDown);
        }

        let mut conn = self.pool.get().await?;
        loop {
            if self.should_stop(cancel) {
                debug!(queue = %self.id, "Dequeue cancelled");
                return Err(QueueError::ShuttingDown);
            }

            let claimed = conn
                .blocking_move(self.keys.main(), self.keys.pending(), self.poll_timeout)
                .await
                .map_err(|e| storage_failure(&mut conn, e))?;

            let Some(raw) = claimed else {
                continue;
            };

            let entry = PendingEntry {
                pending_key: self.keys.pending().to_string(),
                raw,
            };
            return match self.codec.decode(&entry.raw) {
                Ok(message) => {
                    debug!(queue = %self.id, bytes = entry.raw.len(), "Claimed message");
                    Ok(QueuedMessage { message, entry })
                }
                Err(source) => {
                    warn!(
                        queue = %self.id,
                        bytes = entry.raw.len(),
                        error = %source,
                        "Claimed message could not be decoded, leaving it in the processing list"
                    );
                    Err(QueueError::Deserialization { source, entry })
                }
            };
        }
    }

    /// Remove a processed message from the processing list.
    ///
    /// A message that is already gone is logged, not reported.
    pub async fn acknowledge(&self, message: &QueuedMessage<T>) -> Result<(), QueueError> {
        self.discard(&message.entry).await
    }

    /// Remove an entry from the processing list without decoding it.
    ///
    /// This is how an undecodable entry from [`QueueError::Deserialization`]
    /// is dropped.
    pub async fn discard(&self, entry: &PendingEntry) -> Result<(), QueueError> {
        self.ensure_owned(entry)?;

        let mut conn = self.pool.get().await?;
        let removed = conn
            .remove(self.keys.pending(), 1, &entry.raw)
            .await
            .map_err(|e| storage_failure(&mut conn, e))?;

        if removed == 0 {
            warn!(queue = %self.id, "Message already gone from processing list");
        } else {
            debug!(queue = %self.id, "Acknowledged message");
        }
        Ok(())
    }

    /// Move a claimed message back to the tail of the main list.
    ///
    /// Removal from the processing list and the append commit together or
    /// not at all.
    pub async fn requeue(&self, message: &QueuedMessage<T>) -> Result<(), QueueError> {
        let entry = &message.entry;
        self.ensure_owned(entry)?;

        let commands = [
            ListCommand::Remove {
                key: self.keys.pending().to_string(),
                count: 1,
                value: entry.raw.clone(),
            },
            ListCommand::PushBack {
                key: self.keys.main().to_string(),
                value: entry.raw.clone(),
            },
        ];

        let mut conn = self.pool.get().await?;
        let replies = conn
            .atomic(&commands)
            .await
            .map_err(|e| storage_failure(&mut conn, e))?;

        if replies.first() == Some(&0) {
            warn!(
                queue = %self.id,
                "Requeued message was no longer in the processing list and may be delivered twice"
            );
        } else {
            debug!(queue = %self.id, "Requeued message");
        }
        Ok(())
    }

    /// Lengths of the main and processing lists
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let mut conn = self.pool.get().await?;
        let ready = conn
            .len(self.keys.main())
            .await
            .map_err(|e| storage_failure(&mut conn, e))?;
        let pending = conn
            .len(self.keys.pending())
            .await
            .map_err(|e| storage_failure(&mut conn, e))?;
        Ok(QueueStats { ready, pending })
    }

    /// Stop dequeuing and close the shared connection pool.
    ///
    /// Other queues built from the same factory share the pool and stop
    /// working too. Operations still in flight are not aborted.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            info!(queue = %self.id, "Queue shutting down");
        }
        self.pool.close();
        Ok(())
    }

    /// Put every processing-list entry back at the tail of the main list.
    ///
    /// Entries move one at a time, each move atomic, head first, so their
    /// relative order is kept.
    pub(crate) async fn recover(&self) -> Result<usize, QueueError> {
        let mut conn = self.pool.get().await?;
        let mut recovered = 0;

        loop {
            let moved = conn
                .move_front_to_back(self.keys.pending(), self.keys.main())
                .await
                .map_err(|e| storage_failure(&mut conn, e))?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
            info!(queue = %self.id, "Recovered pending message");
        }

        info!(queue = %self.id, recovered, "No more pending messages to recover");
        Ok(recovered)
    }

    /// The pool may be closed by the factory or a sibling queue sharing it
    fn should_stop(&self, cancel: &CancellationSignal) -> bool {
        cancel.is_cancelled() || self.is_shutting_down() || self.pool.is_closed()
    }

    fn ensure_owned(&self, entry: &PendingEntry) -> Result<(), QueueError> {
        if entry.pending_key == self.keys.pending() {
            Ok(())
        } else {
            Err(QueueError::ForeignMessage {
                expected: self.keys.pending().to_string(),
                actual: entry.pending_key.clone(),
            })
        }
    }
}

#[async_trait]
impl<T, C, K> MessageQueue<T> for ReliableQueue<T, C, K>
where
    T: Send + Sync + 'static,
    C: Connector,
    K: MessageCodec<T>,
{
    fn id(&self) -> &QueueId {
        ReliableQueue::id(self)
    }

    async fn enqueue(&self, message: &T) -> Result<(), QueueError> {
        ReliableQueue::enqueue(self, message).await
    }

    async fn dequeue(&self, cancel: &CancellationSignal) -> Result<QueuedMessage<T>, QueueError> {
        ReliableQueue::dequeue(self, cancel).await
    }

    async fn acknowledge(&self, message: &QueuedMessage<T>) -> Result<(), QueueError> {
        ReliableQueue::acknowledge(self, message).await
    }

    async fn requeue(&self, message: &QueuedMessage<T>) -> Result<(), QueueError> {
        ReliableQueue::requeue(self, message).await
    }

    async fn shutdown(&self) -> Result<(), QueueError> {
        ReliableQueue::shutdown(self).await
    }
}
