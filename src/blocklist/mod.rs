//! Block list and violation tracking
//!
//! A block entry denies every admission check for its client, regardless of
//! counter state. Entries are created by an operator or by the
//! [`ViolationTracker`] once a client keeps hitting its quota, and are
//! removed by an explicit unblock or lazily once `expires_at` has passed.

pub mod violations;

pub use violations::{ViolationOutcome, ViolationTracker};

use crate::clock::Clock;
use crate::error::Result;
use crate::store::KvStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Store TTL kept past `expires_at`, so entries nobody reads still get collected
const EXPIRY_GRACE_SECS: u64 = 60;

/// Denial record for a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub client_id: String,
    pub reason: String,
    /// Epoch second the block was created
    pub blocked_at: u64,
    /// Epoch second the block ends; `None` is permanent
    #[serde(default)]
    pub expires_at: Option<u64>,
    /// Violations recorded when the block was created
    #[serde(default)]
    pub violation_count: u64,
}

impl BlockEntry {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }
}

/// TTL'd deny-list keyed by client id
#[derive(Clone)]
pub struct BlockList {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    namespace: String,
}

impl BlockList {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>, namespace: impl Into<String>) -> Self {
        Self {
            kv,
            clock,
            namespace: namespace.into(),
        }
    }

    /// Store key holding a client's block entry
    pub fn key_for(&self, client_id: &str) -> String {
        format!("{}:blocked:{}", self.namespace, client_id)
    }

    /// Return the client's active block entry, deleting it if it has expired
    pub async fn is_blocked(&self, client_id: &str) -> Result<Option<BlockEntry>> {
        let key = self.key_for(client_id);
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(None);
        };

        let entry: BlockEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(client_id, error = %e, "Dropping unreadable block entry");
                self.kv.delete(&key).await?;
                return Ok(None);
            }
        };

        if entry.is_expired(self.clock.now_secs()) {
            debug!(client_id, "Block entry expired, removing");
            self.kv.delete(&key).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Block a client; `None` duration blocks permanently
    pub async fn block(
        &self,
        client_id: &str,
        reason: &str,
        duration: Option<Duration>,
    ) -> Result<BlockEntry> {
        self.block_with_violations(client_id, reason, duration, 0)
            .await
    }

    pub(crate) async fn block_with_violations(
        &self,
        client_id: &str,
        reason: &str,
        duration: Option<Duration>,
        violation_count: u64,
    ) -> Result<BlockEntry> {
        let now = self.clock.now_secs();
        let entry = BlockEntry {
            client_id: client_id.to_string(),
            reason: reason.to_string(),
            blocked_at: now,
            expires_at: duration.map(|d| now + d.as_secs()),
            violation_count,
        };

        let ttl = duration.map(|d| Duration::from_secs(d.as_secs() + EXPIRY_GRACE_SECS));
        let value = serde_json::to_string(&entry)?;
        self.kv.set(&self.key_for(client_id), &value, ttl).await?;

        match entry.expires_at {
            Some(expires_at) => {
                warn!(client_id, reason, expires_at, "Client blocked")
            }
            None => warn!(client_id, reason, "Client blocked permanently"),
        }

        Ok(entry)
    }

    /// Remove a client's block entry; true if one existed
    pub async fn unblock(&self, client_id: &str) -> Result<bool> {
        let removed = self.kv.delete(&self.key_for(client_id)).await?;
        if removed {
            info!(client_id, "Client unblocked");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn blocklist() -> (BlockList, Arc<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        let kv = Arc::new(MemoryStore::new(clock.clone()));
        (BlockList::new(kv.clone(), clock.clone(), "test"), kv, clock)
    }

    #[tokio::test]
    async fn test_not_blocked_by_default() {
        let (blocklist, _, _) = blocklist();
        assert!(blocklist.is_blocked("1.2.3.4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_permanent_block() {
        let (blocklist, _, clock) = blocklist();
        let entry = blocklist.block("1.2.3.4", "abuse", None).await.unwrap();
        assert!(entry.is_permanent());
        assert_eq!(entry.blocked_at, 10_000);

        clock.advance(Duration::from_secs(365 * 86_400));
        let found = blocklist.is_blocked("1.2.3.4").await.unwrap().unwrap();
        assert_eq!(found, entry);
    }

    #[tokio::test]
    async fn test_timed_block_expires() {
        let (blocklist, _, clock) = blocklist();
        let entry = blocklist
            .block("1.2.3.4", "cool off", Some(Duration::from_secs(300)))
            .await
            .unwrap();
        assert_eq!(entry.expires_at, Some(10_300));

        clock.advance(Duration::from_secs(299));
        assert!(blocklist.is_blocked("1.2.3.4").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(blocklist.is_blocked("1.2.3.4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lazy_expiry_deletes_entry() {
        let (blocklist, kv, clock) = blocklist();
        blocklist
            .block("1.2.3.4", "cool off", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        let key = blocklist.key_for("1.2.3.4");

        // Past expires_at but inside the store grace period: still stored
        clock.advance(Duration::from_secs(30));
        assert!(kv.get(&key).await.unwrap().is_some());

        assert!(blocklist.is_blocked("1.2.3.4").await.unwrap().is_none());
        assert!(kv.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_past_expiry_written_directly_is_removed() {
        let (blocklist, kv, _) = blocklist();
        let stale = BlockEntry {
            client_id: "5.6.7.8".to_string(),
            reason: "old".to_string(),
            blocked_at: 1,
            expires_at: Some(2),
            violation_count: 10,
        };
        let key = blocklist.key_for("5.6.7.8");
        kv.set(&key, &serde_json::to_string(&stale).unwrap(), None)
            .await
            .unwrap();

        assert!(blocklist.is_blocked("5.6.7.8").await.unwrap().is_none());
        assert!(kv.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unblock() {
        let (blocklist, _, _) = blocklist();
        blocklist.block("1.2.3.4", "abuse", None).await.unwrap();

        assert!(blocklist.unblock("1.2.3.4").await.unwrap());
        assert!(!blocklist.unblock("1.2.3.4").await.unwrap());
        assert!(blocklist.is_blocked("1.2.3.4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_dropped() {
        let (blocklist, kv, _) = blocklist();
        let key = blocklist.key_for("1.2.3.4");
        kv.set(&key, "{not json", None).await.unwrap();

        assert!(blocklist.is_blocked("1.2.3.4").await.unwrap().is_none());
        assert!(kv.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blocks_are_per_client() {
        let (blocklist, _, _) = blocklist();
        blocklist.block("a", "abuse", None).await.unwrap();

        assert!(blocklist.is_blocked("a").await.unwrap().is_some());
        assert!(blocklist.is_blocked("b").await.unwrap().is_none());
    }
}
