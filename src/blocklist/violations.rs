use super::{BlockEntry, BlockList};
use crate::config::ViolationConfig;
use crate::error::Result;
use crate::rate_limit::counter::CounterStore;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Result of recording one violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationOutcome {
    /// Violations on record after this one
    pub violation_count: u64,
    /// Whether this violation put the client on the block list
    pub auto_blocked: bool,
    /// End of the automatic block, when one was created
    pub expires_at: Option<u64>,
}

/// Counts quota violations per client and escalates repeat offenders
#[derive(Clone)]
pub struct ViolationTracker {
    counters: CounterStore,
    blocklist: BlockList,
    threshold: u64,
    ttl: Duration,
    block_duration: Duration,
}

impl ViolationTracker {
    pub fn new(counters: CounterStore, blocklist: BlockList, config: &ViolationConfig) -> Self {
        Self {
            counters,
            blocklist,
            threshold: config.threshold,
            ttl: Duration::from_secs(config.ttl_secs),
            block_duration: Duration::from_secs(config.block_duration_secs),
        }
    }

    fn key_for(&self, client_id: &str) -> String {
        format!("{}:violations:{}", self.counters.namespace(), client_id)
    }

    /// Current violation count for a client
    pub async fn count(&self, client_id: &str) -> Result<u64> {
        self.counters.read(&self.key_for(client_id)).await
    }

    /// Record one violation; blocks the client once the count reaches the threshold
    ///
    /// Blocked clients record no violations, so any violation at or past the
    /// threshold comes from a client whose previous block has lapsed.
    pub async fn record_violation(&self, client_id: &str, reason: &str) -> Result<ViolationOutcome> {
        let key = self.key_for(client_id);
        let violation_count = self.counters.read(&key).await? + 1;
        self.counters.write(&key, violation_count, self.ttl).await?;

        let auto_blocked = violation_count >= self.threshold;
        let mut expires_at = None;
        if auto_blocked {
            let entry: BlockEntry = self
                .blocklist
                .block_with_violations(
                    client_id,
                    &format!("Automatic block: {}", reason),
                    Some(self.block_duration),
                    violation_count,
                )
                .await?;
            warn!(
                client_id,
                violation_count,
                expires_at = ?entry.expires_at,
                "Client auto-blocked after repeated violations"
            );
            expires_at = entry.expires_at;
        } else {
            info!(client_id, violation_count, reason, "Recorded quota violation");
        }

        Ok(ViolationOutcome {
            violation_count,
            auto_blocked,
            expires_at,
        })
    }

    /// Forget a client's violations
    pub async fn reset(&self, client_id: &str) -> Result<bool> {
        self.counters.clear(&self.key_for(client_id)).await
    }
}
