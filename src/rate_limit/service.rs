use super::counter::CounterStore;
use super::policy::QuotaPolicy;
use super::types::{AdmissionResult, Decision};
use super::window::{Horizon, WindowKey};
use crate::blocklist::{BlockEntry, BlockList, ViolationTracker};
use crate::clock::Clock;
use crate::config::{FailureMode, GatekeeperConfig};
use crate::error::{GatekeeperError, Result};
use crate::metrics;
use crate::store::KvStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Admission control: block list, then minute, hour and cost windows
pub struct AdmissionService {
    counters: CounterStore,
    policy: Arc<QuotaPolicy>,
    blocklist: BlockList,
    violations: ViolationTracker,
    clock: Arc<dyn Clock>,
    failure_mode: FailureMode,
}

impl AdmissionService {
    /// Create a new admission service over a shared store
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: &GatekeeperConfig) -> Self {
        let namespace = config.store.namespace.clone();
        let counters = CounterStore::new(kv.clone(), namespace.clone());
        let blocklist = BlockList::new(kv, clock.clone(), namespace);
        let violations =
            ViolationTracker::new(counters.clone(), blocklist.clone(), &config.violations);

        info!(
            tools = config.tools.len(),
            failure_mode = ?config.failure_mode,
            "Initializing admission service"
        );

        Self {
            counters,
            policy: Arc::new(QuotaPolicy::new(&config.limits, &config.tools)),
            blocklist,
            violations,
            clock,
            failure_mode: config.failure_mode,
        }
    }

    pub fn policy(&self) -> &Arc<QuotaPolicy> {
        &self.policy
    }

    /// Current time as seen by this service
    pub fn now(&self) -> u64 {
        self.clock.now_secs()
    }

    /// Decide whether `client_id` may invoke `operation`
    ///
    /// Store failures never surface as errors here; they are resolved by the
    /// configured [`FailureMode`].
    pub async fn check(&self, client_id: &str, operation: &str) -> AdmissionResult {
        let result = match self.evaluate(client_id, operation).await {
            Ok(result) => result,
            Err(e) => self.on_store_failure(client_id, operation, e),
        };

        metrics::record_admission(result.decision);
        result
    }

    async fn evaluate(&self, client_id: &str, operation: &str) -> Result<AdmissionResult> {
        let now = self.clock.now_secs();
        let limits = self.policy.limits_for(operation);

        if let Some(entry) = self.blocklist.is_blocked(client_id).await? {
            warn!(client_id, operation, reason = %entry.reason, "Rejecting blocked client");
            return Ok(AdmissionResult::blocked(
                entry.reason,
                limits.per_minute,
                entry.expires_at,
            ));
        }

        let minute_key = WindowKey::requests(client_id, Horizon::Minute, now);
        let minute_count = self.counters.read_window(&minute_key).await?;
        if minute_count >= limits.per_minute {
            let result = AdmissionResult::denied(
                Decision::DeniedMinute,
                Horizon::Minute,
                limits.per_minute,
                minute_key.reset_at(),
            );
            return Ok(self.deny(client_id, operation, result).await);
        }

        let hour_key = WindowKey::requests(client_id, Horizon::Hour, now);
        let hour_count = self.counters.read_window(&hour_key).await?;
        if hour_count >= limits.per_hour {
            let result = AdmissionResult::denied(
                Decision::DeniedHour,
                Horizon::Hour,
                limits.per_hour,
                hour_key.reset_at(),
            );
            return Ok(self.deny(client_id, operation, result).await);
        }

        let cost = self.policy.cost_for(operation);
        let budget = self.policy.cost_budget();
        let cost_key = WindowKey::cost(client_id, now);
        let spent = self.counters.read_window(&cost_key).await?;
        if spent.saturating_add(cost) > budget {
            let mut result = AdmissionResult::denied(
                Decision::DeniedCost,
                Horizon::Minute,
                budget,
                cost_key.reset_at(),
            );
            result.remaining = budget.saturating_sub(spent);
            return Ok(self.deny(client_id, operation, result).await);
        }

        // Writes are independent round-trips. A failure part way leaves the
        // earlier counters charged, so the minute counter goes last.
        self.counters
            .write_window(&cost_key, spent.saturating_add(cost))
            .await?;
        self.counters.write_window(&hour_key, hour_count + 1).await?;
        self.counters
            .write_window(&minute_key, minute_count + 1)
            .await?;

        let remaining = limits.per_minute - (minute_count + 1);
        debug!(client_id, operation, remaining, cost, "Request admitted");

        Ok(AdmissionResult::allowed(
            remaining,
            limits.per_minute,
            minute_key.reset_at(),
        ))
    }

    /// Record a violation for a quota denial, escalating to a block if needed
    async fn deny(
        &self,
        client_id: &str,
        operation: &str,
        mut result: AdmissionResult,
    ) -> AdmissionResult {
        let reason = violation_reason(result.decision);
        warn!(
            client_id,
            operation,
            limit = result.limit,
            reset_at = result.reset_at,
            "{}",
            reason
        );

        metrics::record_violation();
        match self.violations.record_violation(client_id, reason).await {
            Ok(outcome) if outcome.auto_blocked => {
                metrics::record_block(true);
                result.blocked = true;
                result.reason = Some(format!("Automatic block: {}", reason));
                if let Some(expires_at) = outcome.expires_at {
                    result.reset_at = expires_at;
                }
            }
            Ok(_) => {}
            Err(e) => {
                metrics::record_store_error();
                error!(client_id, error = %e, "Failed to record violation");
            }
        }

        result
    }

    fn on_store_failure(
        &self,
        client_id: &str,
        operation: &str,
        err: GatekeeperError,
    ) -> AdmissionResult {
        metrics::record_store_error();
        let now = self.clock.now_secs();
        let limits = self.policy.limits_for(operation);

        match self.failure_mode {
            FailureMode::Open => {
                error!(
                    client_id,
                    operation,
                    error = %err,
                    "Counter store unavailable, admitting request (fail-open)"
                );
                let reset_at = WindowKey::requests(client_id, Horizon::Minute, now).reset_at();
                AdmissionResult::allowed(limits.per_minute, limits.per_minute, reset_at)
            }
            FailureMode::Closed => {
                error!(
                    client_id,
                    operation,
                    error = %err,
                    "Counter store unavailable, denying request (fail-closed)"
                );
                AdmissionResult::denied(
                    Decision::DeniedUnavailable,
                    Horizon::Minute,
                    limits.per_minute,
                    now + Horizon::Minute.length_secs(),
                )
            }
        }
    }

    /// Block a client; `None` duration blocks permanently
    pub async fn block(
        &self,
        client_id: &str,
        reason: &str,
        duration: Option<Duration>,
    ) -> Result<BlockEntry> {
        let entry = self.blocklist.block(client_id, reason, duration).await?;
        metrics::record_block(false);
        Ok(entry)
    }

    /// Lift a block and forget the client's violations; true if a block existed
    pub async fn unblock(&self, client_id: &str) -> Result<bool> {
        let removed = self.blocklist.unblock(client_id).await?;
        self.violations.reset(client_id).await?;
        Ok(removed)
    }

    /// Active block entry for a client, if any
    pub async fn is_blocked(&self, client_id: &str) -> Result<Option<BlockEntry>> {
        self.blocklist.is_blocked(client_id).await
    }

    /// Violations currently on record for a client
    pub async fn violation_count(&self, client_id: &str) -> Result<u64> {
        self.violations.count(client_id).await
    }
}

fn violation_reason(decision: Decision) -> &'static str {
    match decision {
        Decision::DeniedMinute => "minute quota exceeded",
        Decision::DeniedHour => "hour quota exceeded",
        Decision::DeniedCost => "cost budget exceeded",
        _ => "quota exceeded",
    }
}
