//! Traits exposed to the dispatch service.

use crate::cancel::CancellationSignal;
use crate::error::QueueError;
use crate::keys::QueueId;
use crate::queue::QueuedMessage;
use async_trait::async_trait;

/// At-least-once queue of `T` messages
#[async_trait]
pub trait MessageQueue<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Id this queue was created for
    fn id(&self) -> &QueueId;

    /// Append a message to the tail of the queue
    async fn enqueue(&self, message: &T) -> Result<(), QueueError>;

    /// Claim the next message, waiting until one arrives or `cancel` fires
    async fn dequeue(&self, cancel: &CancellationSignal) -> Result<QueuedMessage<T>, QueueError>;

    /// Mark a claimed message as processed. Safe to call more than once.
    async fn acknowledge(&self, message: &QueuedMessage<T>) -> Result<(), QueueError>;

    /// Return a claimed message to the tail of the queue for redelivery
    async fn requeue(&self, message: &QueuedMessage<T>) -> Result<(), QueueError>;

    /// Stop dequeuing and release the connection pool
    async fn shutdown(&self) -> Result<(), QueueError>;
}

/// Builds recovered queues by id
#[async_trait]
pub trait QueueFactory<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    type Queue: MessageQueue<T>;

    /// Build the queue for `id`, returning it only after recovery succeeded
    async fn new_queue(&self, id: &str) -> Result<Self::Queue, QueueError>;
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
