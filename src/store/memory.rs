use super::KvStore;
use crate::clock::Clock;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    /// Epoch second at which the value stops being visible
    expires_at: Option<u64>,
}

impl StoredValue {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory store with TTL expiry driven by a [`Clock`]
///
/// Expired entries are dropped when they are next read. Window keys are
/// never read again once their window closes, so long-running processes
/// also need [`MemoryStore::start_purge_task`].
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a new, empty store
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Number of entries currently held, including not-yet-collected expired ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every expired entry
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_secs();
        let before = self.entries.len();
        self.entries.retain(|_, v| !v.is_expired(now));
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(purged, "Purged expired entries from memory store");
        }
        purged
    }

    /// Purge expired entries every `period` until the store is dropped
    pub fn start_purge_task(store: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(store);

        tokio::spawn(async move {
            let mut purge_interval = interval(period);
            info!(
                interval_secs = period.as_secs(),
                "Started memory store purge task"
            );

            loop {
                purge_interval.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.purge_expired();
                    }
                    None => {
                        debug!("Memory store dropped, stopping purge task");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now_secs();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }

        // The read guard above is released before removing
        self.entries.remove_if(key, |_, v| v.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|ttl| self.clock.now_secs() + ttl.as_secs());
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = self.clock.now_secs();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, v)| !v.is_expired(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        (MemoryStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (store, _) = store();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (store, _) = store();
        store.set("a", "1", None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));

        store.set("a", "2", None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_ttl_expiry_removes_on_read() {
        let (store, clock) = store();
        store
            .set("a", "1", Some(Duration::from_secs(10)))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(9));
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _) = store();
        store.set("a", "1", None).await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_expired_reports_absent() {
        let (store, clock) = store();
        store
            .set("a", "1", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(5));

        assert!(!store.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store();
        store
            .set("short", "1", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        store
            .set("long", "1", Some(Duration::from_secs(500)))
            .await
            .unwrap();
        store.set("forever", "1", None).await.unwrap();

        clock.advance(Duration::from_secs(60));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_purge_task_collects_closed_windows() {
        let (store, clock) = store();
        let store = Arc::new(store);
        for minute in 0..30 {
            let key = format!("ns:ratelimit:c:minute:{}", 1_000 + minute * 60);
            store
                .set(&key, "1", Some(Duration::from_secs(120)))
                .await
                .unwrap();
            clock.advance(Duration::from_secs(60));
        }
        assert_eq!(store.len(), 30);

        let task = MemoryStore::start_purge_task(&store, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Only the last window is still live
        assert_eq!(store.len(), 1);
        task.abort();
    }

    #[tokio::test]
    async fn test_purge_task_stops_with_store() {
        let (store, _) = store();
        let store = Arc::new(store);
        let task = MemoryStore::start_purge_task(&store, Duration::from_millis(10));

        drop(store);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
