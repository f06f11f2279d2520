//! In-memory list store for testing and development.
//!
//! This module provides a process-local implementation of the list storage
//! capability that:
//! - Keeps named lists in FIFO order behind a mutex
//! - Implements blocking moves that wake up as soon as a value is pushed
//! - Applies atomic batches to a scratch copy and commits them in one step
//! - Can simulate an unreachable store, refused dials and aborted transactions
//!
//! Clones of a [`MemoryStore`] share the same lists, so a test can keep one
//! clone for inspection while queues use another through the pool.

use crate::error::StorageError;
use crate::storage::{Connector, ListCommand, ListConnection};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

type Lists = HashMap<String, VecDeque<Bytes>>;

/// State shared by every clone of a store
struct SharedState {
    lists: Mutex<Lists>,
    /// Signalled after every committed push
    pushed: Notify,
    available: AtomicBool,
    refuse_connections: AtomicBool,
    /// Number of upcoming transactions to abort midway
    abort_transactions: AtomicUsize,
    connections_opened: AtomicUsize,
}

fn pop_front_push_back(lists: &mut Lists, source: &str, destination: &str) -> Option<Bytes> {
    let value = lists.get_mut(source)?.pop_front()?;
    lists
        .entry(destination.to_string())
        .or_default()
        .push_back(value.clone());
    Some(value)
}

/// Remove up to `count` matches head first; a count of zero removes all matches
fn remove_matching(lists: &mut Lists, key: &str, count: usize, value: &[u8]) -> usize {
    let Some(list) = lists.get_mut(key) else {
        return 0;
    };
    let mut removed = 0;
    list.retain(|item| {
        if (count == 0 || removed < count) && item.as_ref() == value {
            removed += 1;
            false
        } else {
            true
        }
    });
    removed
}

fn push(lists: &mut Lists, key: &str, value: Bytes) -> usize {
    let list = lists.entry(key.to_string()).or_default();
    list.push_back(value);
    list.len()
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Process-local ordered-list store
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<SharedState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SharedState {
                lists: Mutex::new(HashMap::new()),
                pushed: Notify::new(),
                available: AtomicBool::new(true),
                refuse_connections: AtomicBool::new(false),
                abort_transactions: AtomicUsize::new(0),
                connections_opened: AtomicUsize::new(0),
            }),
        }
    }

    /// Connector dialing connections to this store
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            store: self.clone(),
        }
    }

    /// Current contents of the list at `key`, head first
    pub fn snapshot(&self, key: &str) -> Vec<Bytes> {
        self.lists()
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append raw bytes directly, bypassing any codec
    pub fn push_raw(&self, key: &str, value: impl Into<Bytes>) {
        push(&mut self.lists(), key, value.into());
        self.state.pushed.notify_waiters();
    }

    /// Simulate the store becoming unreachable (or reachable again).
    ///
    /// While unavailable every command on every connection fails.
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Make new dials fail while existing connections keep working
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Abort the next `count` atomic batches after their first command ran
    pub fn abort_next_transactions(&self, count: usize) {
        self.state.abort_transactions.store(count, Ordering::SeqCst);
    }

    /// Number of connections dialed so far
    pub fn connections_opened(&self) -> usize {
        self.state.connections_opened.load(Ordering::SeqCst)
    }

    fn lists(&self) -> MutexGuard<'_, Lists> {
        // A panic while holding the lock cannot leave a list half-modified
        self.state
            .lists
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.state.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::ConnectionFailed {
                message: "memory store is unavailable".to_string(),
            })
        }
    }

    fn take_abort(&self) -> bool {
        self.state
            .abort_transactions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryConnector / MemoryConnection
// ============================================================================

/// Dials [`MemoryConnection`]s to a shared [`MemoryStore`]
#[derive(Clone)]
pub struct MemoryConnector {
    store: MemoryStore,
}

#[async_trait]
impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, StorageError> {
        self.store.ensure_available()?;
        if self.store.state.refuse_connections.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionFailed {
                message: "memory store refused the connection".to_string(),
            });
        }
        self.store
            .state
            .connections_opened
            .fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            store: self.store.clone(),
        })
    }
}

/// One connection to a [`MemoryStore`]
pub struct MemoryConnection {
    store: MemoryStore,
}

#[async_trait]
impl ListConnection for MemoryConnection {
    async fn push_back(&mut self, key: &str, value: &[u8]) -> Result<usize, StorageError> {
        self.store.ensure_available()?;
        let len = push(&mut self.store.lists(), key, Bytes::copy_from_slice(value));
        self.store.state.pushed.notify_waiters();
        Ok(len)
    }

    async fn blocking_move(
        &mut self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<Bytes>, StorageError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.store.ensure_available()?;

            // Register interest before looking, so a push between the check
            // and the wait is not missed.
            let notified = self.store.state.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let claimed = pop_front_push_back(&mut self.store.lists(), source, destination);
            if claimed.is_some() {
                return Ok(claimed);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn move_front_to_back(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<Option<Bytes>, StorageError> {
        self.store.ensure_available()?;
        let moved = pop_front_push_back(&mut self.store.lists(), source, destination);
        if moved.is_some() {
            self.store.state.pushed.notify_waiters();
        }
        Ok(moved)
    }

    async fn remove(
        &mut self,
        key: &str,
        count: usize,
        value: &[u8],
    ) -> Result<usize, StorageError> {
        self.store.ensure_available()?;
        Ok(remove_matching(&mut self.store.lists(), key, count, value))
    }

    async fn len(&mut self, key: &str) -> Result<usize, StorageError> {
        self.store.ensure_available()?;
        Ok(self.store.lists().get(key).map_or(0, VecDeque::len))
    }

    async fn atomic(&mut self, commands: &[ListCommand]) -> Result<Vec<i64>, StorageError> {
        self.store.ensure_available()?;
        let abort = self.store.take_abort();

        let mut lists = self.store.lists();
        let mut scratch = lists.clone();
        let mut replies = Vec::with_capacity(commands.len());
        let mut pushed = false;

        for (index, command) in commands.iter().enumerate() {
            if abort && index == 1 {
                return Err(StorageError::TransactionAborted {
                    message: format!("connection lost before {}", command.name()),
                });
            }
            let reply = match command {
                ListCommand::PushBack { key, value } => {
                    pushed = true;
                    push(&mut scratch, key, value.clone())
                }
                ListCommand::Remove { key, count, value } => {
                    remove_matching(&mut scratch, key, *count, value)
                }
            };
            replies.push(reply as i64);
        }

        if abort && commands.len() < 2 {
            return Err(StorageError::TransactionAborted {
                message: "connection lost before EXEC".to_string(),
            });
        }

        *lists = scratch;
        drop(lists);
        if pushed {
            self.store.state.pushed.notify_waiters();
        }
        Ok(replies)
    }
}
