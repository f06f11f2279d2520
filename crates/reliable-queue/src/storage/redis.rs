//! Redis list storage.
//!
//! Claims use `BLMOVE <main> <pending> LEFT RIGHT <timeout>` and recovery uses
//! `LMOVE <pending> <main> LEFT RIGHT`, so the server needs Redis 6.2 or later
//! (or a compatible Valkey/KeyDB build).

use crate::error::StorageError;
use crate::storage::{Connector, ListCommand, ListConnection};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

impl From<::redis::RedisError> for StorageError {
    fn from(err: ::redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            StorageError::ConnectionFailed {
                message: err.to_string(),
            }
        } else if err.kind() == ::redis::ErrorKind::ExecAbortError {
            StorageError::TransactionAborted {
                message: err.to_string(),
            }
        } else {
            StorageError::CommandFailed {
                command: err.code().unwrap_or("redis").to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Dials Redis connections from a `redis://` or `rediss://` URL
#[derive(Clone)]
pub struct RedisConnector {
    client: ::redis::Client,
}

impl RedisConnector {
    /// Parse the dial target; no connection is made until the pool needs one
    pub fn open(dial_target: &str) -> Result<Self, StorageError> {
        let client = ::redis::Client::open(dial_target).map_err(|e| {
            StorageError::ConnectionFailed {
                message: format!("invalid dial target: {}", e),
            }
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Connection = RedisConnection;

    async fn connect(&self) -> Result<RedisConnection, StorageError> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(RedisConnection { conn })
    }
}

/// A pooled Redis connection.
///
/// A blocking claim occupies the whole connection, which is why each caller
/// borrows its own from the pool instead of sharing one multiplexed handle.
pub struct RedisConnection {
    conn: ::redis::aio::MultiplexedConnection,
}

#[async_trait]
impl ListConnection for RedisConnection {
    async fn push_back(&mut self, key: &str, value: &[u8]) -> Result<usize, StorageError> {
        let len: usize = ::redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut self.conn)
            .await?;
        Ok(len)
    }

    async fn blocking_move(
        &mut self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<Bytes>, StorageError> {
        let value: Option<Vec<u8>> = ::redis::cmd("BLMOVE")
            .arg(source)
            .arg(destination)
            .arg("LEFT")
            .arg("RIGHT")
            .arg(timeout.as_secs_f64())
            .query_async(&mut self.conn)
            .await?;
        Ok(value.map(Bytes::from))
    }

    async fn move_front_to_back(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<Option<Bytes>, StorageError> {
        let value: Option<Vec<u8>> = ::redis::cmd("LMOVE")
            .arg(source)
            .arg(destination)
            .arg("LEFT")
            .arg("RIGHT")
            .query_async(&mut self.conn)
            .await?;
        Ok(value.map(Bytes::from))
    }

    async fn remove(
        &mut self,
        key: &str,
        count: usize,
        value: &[u8],
    ) -> Result<usize, StorageError> {
        let removed: usize = ::redis::cmd("LREM")
            .arg(key)
            .arg(count)
            .arg(value)
            .query_async(&mut self.conn)
            .await?;
        Ok(removed)
    }

    async fn len(&mut self, key: &str) -> Result<usize, StorageError> {
        let len: usize = ::redis::cmd("LLEN")
            .arg(key)
            .query_async(&mut self.conn)
            .await?;
        Ok(len)
    }

    async fn atomic(&mut self, commands: &[ListCommand]) -> Result<Vec<i64>, StorageError> {
        let mut pipe = ::redis::pipe();
        pipe.atomic();
        for command in commands {
            match command {
                ListCommand::PushBack { key, value } => {
                    pipe.cmd("RPUSH").arg(key).arg(&value[..]);
                }
                ListCommand::Remove { key, count, value } => {
                    pipe.cmd("LREM").arg(key).arg(*count).arg(&value[..]);
                }
            }
        }

        // EXEC replies with nil when the transaction was discarded
        let replies: Option<Vec<i64>> = pipe.query_async(&mut self.conn).await?;
        let replies = replies.ok_or_else(|| StorageError::TransactionAborted {
            message: "EXEC returned nil".to_string(),
        })?;

        if replies.len() != commands.len() {
            return Err(StorageError::UnexpectedReply {
                command: "EXEC".to_string(),
                message: format!(
                    "expected {} replies, got {}",
                    commands.len(),
                    replies.len()
                ),
            });
        }
        Ok(replies)
    }
}
