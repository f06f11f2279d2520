//! Construction of recovered queue handles sharing one connection pool.

use crate::client::QueueFactory;
use crate::codec::{JsonCodec, MessageCodec};
use crate::config::QueueSettings;
use crate::error::{ConfigurationError, QueueError};
use crate::keys::QueueId;
use crate::pool::ConnectionPool;
use crate::queue::ReliableQueue;
use crate::storage::Connector;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

#[cfg(feature = "redis")]
use crate::storage::RedisConnector;

#[cfg(test)]
#[path = "factory_tests.rs"]
mod tests;

/// Owns the connection pool and builds [`ReliableQueue`]s on it
pub struct ReliableQueueFactory<C: Connector, K = JsonCodec> {
    pool: Arc<ConnectionPool<C>>,
    settings: QueueSettings,
    codec: K,
}

impl<C: Connector> ReliableQueueFactory<C, JsonCodec> {
    /// Validate `settings` and create the pool. No connection is dialed yet.
    pub fn new(connector: C, settings: QueueSettings) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        let pool = ConnectionPool::new(connector, settings.pool.clone());
        info!(
            namespace = %settings.namespace,
            max_idle = settings.pool.max_idle,
            "Queue factory created"
        );
        Ok(Self {
            pool,
            settings,
            codec: JsonCodec,
        })
    }
}

#[cfg(feature = "redis")]
impl ReliableQueueFactory<RedisConnector, JsonCodec> {
    /// Factory for the Redis server at `settings.pool.dial_target`
    pub fn connect(settings: QueueSettings) -> Result<Self, QueueError> {
        settings.validate()?;
        let connector = RedisConnector::open(&settings.pool.dial_target)?;
        Ok(Self::new(connector, settings)?)
    }
}

impl<C: Connector, K> ReliableQueueFactory<C, K> {
    /// Use `codec` for every queue built from now on
    pub fn with_codec<K2>(self, codec: K2) -> ReliableQueueFactory<C, K2> {
        ReliableQueueFactory {
            pool: self.pool,
            settings: self.settings,
            codec,
        }
    }

    /// Build the queue for `id` and recover its processing list.
    ///
    /// The handle is returned only if recovery completed.
    pub async fn new_queue<T>(&self, id: &str) -> Result<ReliableQueue<T, C, K>, QueueError>
    where
        T: Send + Sync + 'static,
        K: MessageCodec<T> + Clone,
    {
        let id = QueueId::new(id.to_string())?;
        let queue = ReliableQueue::new(
            id,
            &self.settings.namespace,
            Arc::clone(&self.pool),
            self.codec.clone(),
            self.settings.poll_timeout(),
        );

        if let Err(e) = queue.recover().await {
            error!(queue = %queue.id(), error = %e, "Recovery failed, queue not created");
            return Err(e);
        }
        Ok(queue)
    }

    /// Close the shared pool; every queue built here stops working.
    ///
    /// Dequeues already waiting return `ShuttingDown` after their current
    /// poll attempt.
    pub fn shutdown(&self) {
        self.pool.close();
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }
}

#[async_trait]
impl<T, C, K> QueueFactory<T> for ReliableQueueFactory<C, K>
where
    T: Send + Sync + 'static,
    C: Connector,
    K: MessageCodec<T> + Clone,
{
    type Queue = ReliableQueue<T, C, K>;

    async fn new_queue(&self, id: &str) -> Result<Self::Queue, QueueError> {
        ReliableQueueFactory::new_queue(self, id).await
    }
}
