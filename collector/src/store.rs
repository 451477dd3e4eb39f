use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

/// Append-only log of every payload the collector has accepted.
///
/// Payloads are kept exactly as they arrived, so listing them gives back the
/// same JSON objects, nulls and integer coordinates included.
///
/// Cloning is cheap and every clone shares the same log. Appends are
/// serialized by the write lock, so concurrent receivers never lose an entry;
/// their relative order is the order in which they acquired the lock.
#[derive(Debug, Clone, Default)]
pub struct TrafficStore {
    payloads: Arc<RwLock<Vec<Value>>>,
}

impl TrafficStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload and return the new length of the log.
    pub async fn append(&self, payload: Value) -> usize {
        let mut payloads = self.payloads.write().await;
        payloads.push(payload);
        payloads.len()
    }

    /// A consistent copy of everything received so far, oldest first.
    pub async fn snapshot(&self) -> Vec<Value> {
        self.payloads.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.payloads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payloads.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = TrafficStore::new();
        assert!(store.is_empty().await);

        assert_eq!(store.append(json!({"ip_address": "10.0.0.1"})).await, 1);
        assert_eq!(store.append(json!({"ip_address": "10.0.0.2"})).await, 2);

        assert_eq!(
            store.snapshot().await,
            vec![
                json!({"ip_address": "10.0.0.1"}),
                json!({"ip_address": "10.0.0.2"}),
            ]
        );
    }

    #[tokio::test]
    async fn test_clones_share_log() {
        let store = TrafficStore::new();
        let other = store.clone();
        other.append(json!({"ip_address": "10.0.0.1"})).await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let store = TrafficStore::new();
        store.append(json!({"ip_address": "10.0.0.1"})).await;
        let before = store.snapshot().await;
        store.append(json!({"ip_address": "10.0.0.2"})).await;
        assert_eq!(before.len(), 1);
        assert_eq!(store.len().await, 2);
    }
}
