//! Common test utilities for reliable-queue integration tests
//!
//! This module provides:
//! - A push-notification message type resembling the dispatch service's payloads
//! - Factory builders over a shared in-memory store
//! - Tracing setup for test output

use reliable_queue::{
    CancellationSignal, MemoryConnector, MemoryStore, PoolConfig, QueuedMessage, QueueSettings,
    ReliableQueue, ReliableQueueFactory,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::time::Duration;

/// Poll timeout short enough to keep cancellation tests fast
#[allow(dead_code)]
pub const TEST_POLL_TIMEOUT_MS: u64 = 50;

#[allow(dead_code)]
pub type MemoryQueue = ReliableQueue<PushMessage, MemoryConnector>;

// ============================================================================
// Test Messages
// ============================================================================

/// Push notification as handed over by the dispatch service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PushMessage {
    pub service: String,
    pub tokens: Vec<String>,
    pub payload: BTreeMap<String, String>,
}

impl PushMessage {
    #[allow(dead_code)]
    pub fn new(label: &str) -> Self {
        let mut payload = BTreeMap::new();
        payload.insert("alert".to_string(), label.to_string());
        Self {
            service: "apns".to_string(),
            tokens: vec![format!("token-{}", label)],
            payload,
        }
    }

    #[allow(dead_code)]
    pub fn label(&self) -> &str {
        self.payload.get("alert").map(String::as_str).unwrap_or("")
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Install a test-friendly tracing subscriber once per test binary
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reliable_queue=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn test_settings() -> QueueSettings {
    QueueSettings {
        poll_timeout_ms: TEST_POLL_TIMEOUT_MS,
        pool: PoolConfig {
            dial_target: "memory://".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A factory standing in for one service process attached to `store`
#[allow(dead_code)]
pub fn process_factory(store: &MemoryStore) -> ReliableQueueFactory<MemoryConnector> {
    ReliableQueueFactory::new(store.connector(), test_settings())
        .expect("test settings are valid")
}

/// Dequeue with a safety timeout so a broken test fails instead of hanging
#[allow(dead_code)]
pub async fn claim(queue: &MemoryQueue) -> QueuedMessage<PushMessage> {
    tokio::time::timeout(
        Duration::from_secs(5),
        queue.dequeue(&CancellationSignal::never()),
    )
    .await
    .expect("dequeue timed out")
    .expect("dequeue failed")
}
