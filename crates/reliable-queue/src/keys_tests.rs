//! Tests for queue ids and key derivation.

use super::*;

mod queue_id {
    use super::*;

    /// Verify that typical dispatch queue ids are accepted.
    #[test]
    fn test_valid_ids() {
        for id in ["apns", "fcm-production", "webpush_v2", "email.digest", "a"] {
            let parsed = QueueId::new(id.to_string());
            assert!(parsed.is_ok(), "expected '{}' to be valid", id);
            assert_eq!(parsed.unwrap().as_str(), id);
        }
    }

    /// Verify that an empty id is rejected.
    #[test]
    fn test_empty_id_rejected() {
        let result = QueueId::new(String::new());
        assert!(matches!(result, Err(ValidationError::Required { .. })));
    }

    /// Verify that overly long ids are rejected.
    #[test]
    fn test_long_id_rejected() {
        let result = QueueId::new("q".repeat(261));
        assert!(matches!(result, Err(ValidationError::OutOfRange { .. })));
    }

    /// Verify that the key separator cannot appear inside an id.
    ///
    /// Otherwise "x:pending" would address the processing list of queue "x".
    #[test]
    fn test_separator_rejected() {
        let result = QueueId::new("x:pending".to_string());
        assert!(matches!(result, Err(ValidationError::InvalidFormat { .. })));
    }

    /// Verify that whitespace and non-ASCII characters are rejected.
    #[test]
    fn test_invalid_characters_rejected() {
        assert!(QueueId::new("has space".to_string()).is_err());
        assert!(QueueId::new("ünïcode".to_string()).is_err());
    }

    #[test]
    fn test_from_str_and_display() {
        let id: QueueId = "apns".parse().unwrap();
        assert_eq!(id.to_string(), "apns");
    }
}

mod list_keys {
    use super::*;

    /// Verify the main and processing key layout.
    #[test]
    fn test_derive_keys() {
        let id = QueueId::new("apns".to_string()).unwrap();
        let keys = ListKeys::derive(DEFAULT_NAMESPACE, &id);

        assert_eq!(keys.main(), "shove:apns");
        assert_eq!(keys.pending(), "shove:apns:pending");
    }

    /// Verify that different namespaces never share keys.
    #[test]
    fn test_namespaces_are_isolated() {
        let id = QueueId::new("apns".to_string()).unwrap();
        let a = ListKeys::derive("tenant-a", &id);
        let b = ListKeys::derive("tenant-b", &id);

        assert_ne!(a.main(), b.main());
        assert_ne!(a.pending(), b.pending());
    }
}
