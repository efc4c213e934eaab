use super::window::WindowKey;
use crate::error::Result;
use crate::store::KvStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Reads and writes integer counters in the shared store
///
/// There is no atomic increment here: callers read, add in process and
/// write back. Two instances racing on the same window can both read the
/// same value, so a client may briefly get more than its limit (at most
/// one extra request per concurrent in-flight request). Counting never
/// errs on the side of denying.
#[derive(Clone)]
pub struct CounterStore {
    kv: Arc<dyn KvStore>,
    namespace: String,
}

impl CounterStore {
    pub fn new(kv: Arc<dyn KvStore>, namespace: impl Into<String>) -> Self {
        Self {
            kv,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Read a raw counter; missing keys read as zero
    pub async fn read(&self, key: &str) -> Result<u64> {
        match self.kv.get(key).await? {
            Some(raw) => match raw.parse::<u64>() {
                Ok(count) => Ok(count),
                Err(_) => {
                    warn!(key, value = %raw, "Ignoring unparseable counter value");
                    Ok(0)
                }
            },
            None => Ok(0),
        }
    }

    /// Overwrite a raw counter with a fresh TTL
    pub async fn write(&self, key: &str, value: u64, ttl: Duration) -> Result<()> {
        self.kv.set(key, &value.to_string(), Some(ttl)).await
    }

    /// Read the counter for a window
    pub async fn read_window(&self, key: &WindowKey) -> Result<u64> {
        self.read(&key.to_store_key(&self.namespace)).await
    }

    /// Write the counter for a window, expiring two windows later
    pub async fn write_window(&self, key: &WindowKey, value: u64) -> Result<()> {
        self.write(
            &key.to_store_key(&self.namespace),
            value,
            key.horizon.ttl(),
        )
        .await
    }

    /// Delete a raw counter
    pub async fn clear(&self, key: &str) -> Result<bool> {
        self.kv.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::window::Horizon;
    use crate::store::MemoryStore;

    fn counters() -> (CounterStore, Arc<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(600));
        let kv = Arc::new(MemoryStore::new(clock.clone()));
        (CounterStore::new(kv.clone(), "test"), kv, clock)
    }

    #[tokio::test]
    async fn test_missing_counter_reads_zero() {
        let (counters, _, _) = counters();
        assert_eq!(counters.read("test:nothing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_then_read_window() {
        let (counters, _, _) = counters();
        let key = WindowKey::requests("c", Horizon::Minute, 600);

        counters.write_window(&key, 3).await.unwrap();
        assert_eq!(counters.read_window(&key).await.unwrap(), 3);
        assert_eq!(
            counters.read("test:ratelimit:c:minute:600").await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_window_counter_expires_after_two_windows() {
        let (counters, _, clock) = counters();
        let key = WindowKey::requests("c", Horizon::Minute, 600);
        counters.write_window(&key, 5).await.unwrap();

        clock.advance(Duration::from_secs(119));
        assert_eq!(counters.read_window(&key).await.unwrap(), 5);

        clock.advance(Duration::from_secs(1));
        assert_eq!(counters.read_window(&key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_garbage_value_reads_zero() {
        let (counters, kv, _) = counters();
        kv.set("test:junk", "not-a-number", None).await.unwrap();
        assert_eq!(counters.read("test:junk").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let (counters, _, _) = counters();
        counters
            .write("test:v", 2, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(counters.clear("test:v").await.unwrap());
        assert_eq!(counters.read("test:v").await.unwrap(), 0);
    }
}
