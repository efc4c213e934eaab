use super::window::Horizon;
use serde::{Deserialize, Serialize};

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    /// Client is on the block list
    DeniedBlocked,
    /// Minute request count exhausted
    DeniedMinute,
    /// Hour request count exhausted
    DeniedHour,
    /// Minute cost budget exhausted
    DeniedCost,
    /// Store unreachable and the service fails closed
    DeniedUnavailable,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allowed => "allowed",
            Decision::DeniedBlocked => "denied_blocked",
            Decision::DeniedMinute => "denied_minute",
            Decision::DeniedHour => "denied_hour",
            Decision::DeniedCost => "denied_cost",
            Decision::DeniedUnavailable => "denied_unavailable",
        }
    }

    /// Whether this is a quota denial a client recovers from by waiting
    pub fn is_quota_exceeded(self) -> bool {
        matches!(
            self,
            Decision::DeniedMinute | Decision::DeniedHour | Decision::DeniedCost
        )
    }
}

/// Admission check result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Remaining requests (or cost, for cost denials) in the reported window
    pub remaining: u64,
    /// Epoch second at which the reported window resets (block expiry when blocked, 0 if permanent)
    pub reset_at: u64,
    /// Limit of the reported window
    pub limit: u64,
    /// Window the figures refer to
    pub horizon: Horizon,
    /// Set when the client is (or just became) blocked
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
    pub decision: Decision,
    /// Block reason, when blocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AdmissionResult {
    /// Create an allowed result
    pub fn allowed(remaining: u64, limit: u64, reset_at: u64) -> Self {
        Self {
            allowed: true,
            remaining,
            limit,
            reset_at,
            horizon: Horizon::Minute,
            blocked: false,
            decision: Decision::Allowed,
            reason: None,
        }
    }

    /// Create a quota denial
    pub fn denied(decision: Decision, horizon: Horizon, limit: u64, reset_at: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            limit,
            reset_at,
            horizon,
            blocked: false,
            decision,
            reason: None,
        }
    }

    /// Create a blocked-client denial
    pub fn blocked(reason: String, limit: u64, expires_at: Option<u64>) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            limit,
            reset_at: expires_at.unwrap_or(0),
            horizon: Horizon::Minute,
            blocked: true,
            decision: Decision::DeniedBlocked,
            reason: Some(reason),
        }
    }

    /// Seconds until the reported window resets, never negative
    pub fn retry_after(&self, now: u64) -> u64 {
        self.reset_at.saturating_sub(now)
    }
}
