//! Shared connection pool with scoped borrow and return.
//!
//! Every queue operation borrows one connection for its duration through a
//! [`PooledConnection`] guard. Dropping the guard returns the connection, so
//! release happens on every exit path, errors included. The pool keeps at most
//! `max_idle` connections warm and recycles those idle for longer than
//! `idle_timeout`. The number of connections in use is not capped.

use crate::config::PoolConfig;
use crate::error::StorageError;
use crate::storage::Connector;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, info};

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;

struct IdleConnection<T> {
    conn: T,
    returned_at: Instant,
}

/// Point-in-time view of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub active: usize,
    pub closed: bool,
}

/// Pool of storage connections shared by queue handles
pub struct ConnectionPool<C: Connector> {
    connector: C,
    config: PoolConfig,
    /// Most recently returned connection last
    idle: Mutex<Vec<IdleConnection<C::Connection>>>,
    active: AtomicUsize,
    closed: AtomicBool,
}

impl<C: Connector> ConnectionPool<C> {
    pub fn new(connector: C, config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            connector,
            config,
            idle: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Borrow a connection, reusing a warm one when possible
    pub async fn get(self: &Arc<Self>) -> Result<PooledConnection<C>, StorageError> {
        if self.is_closed() {
            return Err(StorageError::PoolClosed);
        }

        let conn = match self.take_idle() {
            Some(conn) => conn,
            None => {
                debug!("Dialing new storage connection");
                self.connector.connect().await?
            }
        };

        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(PooledConnection {
            pool: Arc::clone(self),
            conn: Some(conn),
            broken: false,
        })
    }

    /// Close the pool. Idle connections are dropped now; borrowed ones when
    /// they are returned. Calling this more than once has no further effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped = {
            let mut idle = self.idle();
            let count = idle.len();
            idle.clear();
            count
        };
        info!(
            idle_closed = dropped,
            still_borrowed = self.active.load(Ordering::SeqCst),
            "Connection pool closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle().len(),
            active: self.active.load(Ordering::SeqCst),
            closed: self.is_closed(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn idle(&self) -> MutexGuard<'_, Vec<IdleConnection<C::Connection>>> {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_idle(&self) -> Option<C::Connection> {
        let timeout = self.config.idle_timeout();
        let mut idle = self.idle();

        let before = idle.len();
        idle.retain(|entry| entry.returned_at.elapsed() < timeout);
        if idle.len() < before {
            debug!(recycled = before - idle.len(), "Dropped stale idle connections");
        }

        idle.pop().map(|entry| entry.conn)
    }

    fn put_back(&self, conn: C::Connection, broken: bool) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        if broken || self.is_closed() {
            return;
        }

        let mut idle = self.idle();
        if idle.len() >= self.config.max_idle {
            return;
        }
        idle.push(IdleConnection {
            conn,
            returned_at: Instant::now(),
        });
    }
}

/// A connection borrowed from a [`ConnectionPool`]; returned on drop
pub struct PooledConnection<C: Connector> {
    pool: Arc<ConnectionPool<C>>,
    /// Only `None` after drop has taken it
    conn: Option<C::Connection>,
    broken: bool,
}

impl<C: Connector> PooledConnection<C> {
    /// Close the connection instead of returning it to the pool
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("pooled connection used after release")
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("pooled connection used after release")
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn, self.broken);
        }
    }
}
