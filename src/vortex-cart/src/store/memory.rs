//! In-process snapshot store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{SnapshotStore, StoreError};
use crate::clock::{Clock, SystemClock};
use crate::snapshot::{CartSnapshot, StoreEntry};
use crate::token::Token;

/// Snapshot store backed by a `HashMap`. Expired entries are hidden on read
/// and removed by [`SnapshotStore::purge_expired`].
pub struct MemorySnapshotStore {
    entries: RwLock<HashMap<Token, StoreEntry>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemorySnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySnapshotStore").finish_non_exhaustive()
    }
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for MemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn put(
        &self,
        token: &Token,
        snapshot: &CartSnapshot,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let entry = StoreEntry::new(token.clone(), snapshot.clone(), self.clock.now(), ttl);
        let mut entries = self.entries.write().await;
        if entries.insert(token.clone(), entry).is_some() {
            debug!(token = %token, "Replaced existing snapshot on token collision");
        }
        Ok(())
    }

    async fn get(&self, token: &Token) -> Result<Option<CartSnapshot>, StoreError> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(token)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.snapshot.clone()))
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let initial_count = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(initial_count - entries.len())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::snapshot::LineItem;

    fn token(raw: &str) -> Token {
        Token::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_put_get() {
        let store = MemorySnapshotStore::new();
        let snapshot = CartSnapshot::new(vec![LineItem::new(1, 2)]);

        store
            .put(&token("abc12345"), &snapshot, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get(&token("abc12345")).await.unwrap(), Some(snapshot));
        assert_eq!(store.get(&token("zzz99999")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_is_repeatable() {
        let store = MemorySnapshotStore::new();
        let snapshot = CartSnapshot::new(vec![LineItem::new(1, 1)]);
        store
            .put(&token("again123"), &snapshot, Duration::from_secs(60))
            .await
            .unwrap();

        for _ in 0..3 {
            assert!(store.get(&token("again123")).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_collision_overwrites() {
        let store = MemorySnapshotStore::new();
        let first = CartSnapshot::new(vec![LineItem::new(1, 1)]);
        let second = CartSnapshot::new(vec![LineItem::new(2, 5)]);

        store
            .put(&token("same1234"), &first, Duration::from_secs(60))
            .await
            .unwrap();
        store
            .put(&token("same1234"), &second, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get(&token("same1234")).await.unwrap(), Some(second));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let clock = Arc::new(ManualClock::default());
        let store = MemorySnapshotStore::with_clock(clock.clone());
        let snapshot = CartSnapshot::new(vec![LineItem::new(1, 1)]);

        store
            .put(&token("short111"), &snapshot, Duration::from_secs(10))
            .await
            .unwrap();
        store
            .put(&token("long2222"), &snapshot, Duration::from_secs(1000))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(11));
        assert_eq!(store.get(&token("short111")).await.unwrap(), None);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get(&token("long2222")).await.unwrap().is_some());
    }
}
