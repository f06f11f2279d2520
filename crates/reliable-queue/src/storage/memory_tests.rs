//! Tests for the in-memory list store.

use super::*;

async fn connection(store: &MemoryStore) -> MemoryConnection {
    store.connector().connect().await.expect("connect")
}

// ============================================================================
// List Primitive Tests
// ============================================================================

mod list_primitives {
    use super::*;

    /// Verify that pushes append at the tail and report the new length.
    #[tokio::test]
    async fn test_push_back_appends_in_order() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;

        assert_eq!(conn.push_back("q", b"a").await.unwrap(), 1);
        assert_eq!(conn.push_back("q", b"b").await.unwrap(), 2);

        assert_eq!(store.snapshot("q"), vec![Bytes::from("a"), Bytes::from("b")]);
    }

    /// Verify that a move takes the head of the source and appends to the destination.
    #[tokio::test]
    async fn test_move_front_to_back() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;
        store.push_raw("src", "a");
        store.push_raw("src", "b");
        store.push_raw("dst", "z");

        let moved = conn.move_front_to_back("src", "dst").await.unwrap();

        assert_eq!(moved, Some(Bytes::from("a")));
        assert_eq!(store.snapshot("src"), vec![Bytes::from("b")]);
        assert_eq!(store.snapshot("dst"), vec![Bytes::from("z"), Bytes::from("a")]);
    }

    #[tokio::test]
    async fn test_move_from_empty_list_returns_none() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;

        assert_eq!(conn.move_front_to_back("src", "dst").await.unwrap(), None);
        assert!(store.snapshot("dst").is_empty());
    }

    /// Verify that removal is count limited and head first.
    #[tokio::test]
    async fn test_remove_respects_count() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;
        for value in ["x", "y", "x", "x"] {
            store.push_raw("q", value);
        }

        assert_eq!(conn.remove("q", 1, b"x").await.unwrap(), 1);
        assert_eq!(
            store.snapshot("q"),
            vec![Bytes::from("y"), Bytes::from("x"), Bytes::from("x")]
        );

        assert_eq!(conn.remove("q", 0, b"x").await.unwrap(), 2);
        assert_eq!(store.snapshot("q"), vec![Bytes::from("y")]);

        assert_eq!(conn.remove("q", 1, b"missing").await.unwrap(), 0);
        assert_eq!(conn.remove("absent", 1, b"x").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_len_of_missing_key_is_zero() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;
        store.push_raw("q", "a");

        assert_eq!(conn.len("q").await.unwrap(), 1);
        assert_eq!(conn.len("absent").await.unwrap(), 0);
    }
}

// ============================================================================
// Blocking Move Tests
// ============================================================================

mod blocking_move {
    use super::*;

    /// Verify that a blocking move returns immediately when data is present.
    #[tokio::test]
    async fn test_returns_available_value() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;
        store.push_raw("src", "a");

        let moved = conn
            .blocking_move("src", "dst", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(moved, Some(Bytes::from("a")));
        assert_eq!(store.snapshot("dst"), vec![Bytes::from("a")]);
    }

    /// Verify that an empty source times out with None.
    #[tokio::test]
    async fn test_times_out_on_empty_source() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;

        let started = std::time::Instant::now();
        let moved = conn
            .blocking_move("src", "dst", Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(moved, None);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    /// Verify that a waiting move wakes up when another connection pushes.
    #[tokio::test]
    async fn test_wakes_on_push() {
        let store = MemoryStore::new();
        let mut waiter = connection(&store).await;
        let mut producer = connection(&store).await;

        let handle = tokio::spawn(async move {
            waiter
                .blocking_move("src", "dst", Duration::from_secs(10))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        producer.push_back("src", b"late").await.unwrap();

        let moved = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("waiter should wake before its own timeout")
            .unwrap()
            .unwrap();
        assert_eq!(moved, Some(Bytes::from("late")));
    }
}

// ============================================================================
// Atomic Batch Tests
// ============================================================================

mod atomic_batches {
    use super::*;

    fn requeue_batch(value: &str) -> Vec<ListCommand> {
        vec![
            ListCommand::Remove {
                key: "pending".to_string(),
                count: 1,
                value: Bytes::from(value.to_string()),
            },
            ListCommand::PushBack {
                key: "main".to_string(),
                value: Bytes::from(value.to_string()),
            },
        ]
    }

    /// Verify that a batch applies every command and returns per-command replies.
    #[tokio::test]
    async fn test_batch_commits_all_commands() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;
        store.push_raw("pending", "m");

        let replies = conn.atomic(&requeue_batch("m")).await.unwrap();

        assert_eq!(replies, vec![1, 1]);
        assert!(store.snapshot("pending").is_empty());
        assert_eq!(store.snapshot("main"), vec![Bytes::from("m")]);
    }

    /// Verify that an aborted batch leaves no partial effect behind.
    #[tokio::test]
    async fn test_aborted_batch_commits_nothing() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;
        store.push_raw("pending", "m");
        store.abort_next_transactions(1);

        let result = conn.atomic(&requeue_batch("m")).await;

        assert!(matches!(
            result,
            Err(StorageError::TransactionAborted { .. })
        ));
        assert_eq!(store.snapshot("pending"), vec![Bytes::from("m")]);
        assert!(store.snapshot("main").is_empty());

        // The fault is consumed; the retry succeeds
        assert!(conn.atomic(&requeue_batch("m")).await.is_ok());
        assert_eq!(store.snapshot("main"), vec![Bytes::from("m")]);
    }
}

// ============================================================================
// Fault Injection Tests
// ============================================================================

mod fault_injection {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_store_fails_commands_and_dials() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;
        store.set_available(false);

        assert!(matches!(
            conn.push_back("q", b"a").await,
            Err(StorageError::ConnectionFailed { .. })
        ));
        assert!(store.connector().connect().await.is_err());

        store.set_available(true);
        assert!(conn.push_back("q", b"a").await.is_ok());
    }

    /// Verify that refused dials do not affect established connections.
    #[tokio::test]
    async fn test_refused_connections() {
        let store = MemoryStore::new();
        let mut conn = connection(&store).await;
        store.refuse_connections(true);

        assert!(store.connector().connect().await.is_err());
        assert!(conn.len("q").await.is_ok());
        assert_eq!(store.connections_opened(), 1);
    }

    /// Verify that clones share the same lists.
    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let clone = store.clone();
        let mut conn = connection(&clone).await;

        conn.push_back("q", b"shared").await.unwrap();

        assert_eq!(store.snapshot("q"), vec![Bytes::from("shared")]);
    }
}
