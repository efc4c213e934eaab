//! Fixed-window counter keys
//!
//! A window starts at `floor(now / length) * length`, so every instance
//! computes the same key for the same client and instant without
//! coordination. Windows are fixed, not sliding: a client can land up to
//! twice the nominal limit by bursting on both sides of a boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Time horizon a counter is bucketed by
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Minute,
    Hour,
}

impl Horizon {
    /// Window length in seconds
    pub fn length_secs(self) -> u64 {
        match self {
            Horizon::Minute => 60,
            Horizon::Hour => 3_600,
        }
    }

    /// Counter TTL: two windows, so a skewed clock never reads a vanished key
    pub fn ttl(self) -> Duration {
        Duration::from_secs(self.length_secs() * 2)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Horizon::Minute => "minute",
            Horizon::Hour => "hour",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a counter accumulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    /// Raw request count
    Requests,
    /// Weighted cost, kept apart from raw counts
    Cost,
}

impl CounterKind {
    fn segment(self) -> &'static str {
        match self {
            CounterKind::Requests => "ratelimit",
            CounterKind::Cost => "cost",
        }
    }
}

/// Identity of one window counter: (client, horizon, window start)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub kind: CounterKind,
    pub client_id: String,
    pub horizon: Horizon,
    /// Epoch second the window starts at, aligned to the horizon length
    pub window_start: u64,
}

impl WindowKey {
    /// Key for the window containing `now`
    pub fn at(kind: CounterKind, client_id: &str, horizon: Horizon, now: u64) -> Self {
        let length = horizon.length_secs();
        Self {
            kind,
            client_id: client_id.to_string(),
            horizon,
            window_start: (now / length) * length,
        }
    }

    /// Request-count key for the window containing `now`
    pub fn requests(client_id: &str, horizon: Horizon, now: u64) -> Self {
        Self::at(CounterKind::Requests, client_id, horizon, now)
    }

    /// Cost key; cost is only tracked per minute
    pub fn cost(client_id: &str, now: u64) -> Self {
        Self::at(CounterKind::Cost, client_id, Horizon::Minute, now)
    }

    /// Epoch second at which this window ends and the next key takes over
    pub fn reset_at(&self) -> u64 {
        self.window_start + self.horizon.length_secs()
    }

    /// Convert to a store key under `namespace`
    pub fn to_store_key(&self, namespace: &str) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            namespace,
            self.kind.segment(),
            self.client_id,
            self.horizon,
            self.window_start
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_start_is_floor_aligned() {
        let key = WindowKey::requests("1.2.3.4", Horizon::Minute, 1_000_059);
        assert_eq!(key.window_start, 1_000_020);
        assert_eq!(key.reset_at(), 1_000_080);

        let key = WindowKey::requests("1.2.3.4", Horizon::Hour, 1_000_059);
        assert_eq!(key.window_start, 997_200);
        assert_eq!(key.reset_at(), 1_000_800);
    }

    #[test]
    fn test_key_stable_within_window() {
        let first = WindowKey::requests("c", Horizon::Minute, 120);
        let last = WindowKey::requests("c", Horizon::Minute, 179);
        assert_eq!(first, last);
        assert_eq!(first.to_store_key("ns"), last.to_store_key("ns"));
    }

    #[test]
    fn test_key_changes_at_boundary() {
        let before = WindowKey::requests("c", Horizon::Minute, 179);
        let after = WindowKey::requests("c", Horizon::Minute, 180);
        assert_ne!(before.to_store_key("ns"), after.to_store_key("ns"));
        assert_eq!(before.reset_at(), after.window_start);
    }

    #[test]
    fn test_store_key_format() {
        let key = WindowKey::requests("1.2.3.4", Horizon::Hour, 7_200);
        assert_eq!(
            key.to_store_key("gatekeeper"),
            "gatekeeper:ratelimit:1.2.3.4:hour:7200"
        );

        let cost = WindowKey::cost("1.2.3.4", 7_230);
        assert_eq!(
            cost.to_store_key("gatekeeper"),
            "gatekeeper:cost:1.2.3.4:minute:7200"
        );
    }

    #[test]
    fn test_cost_and_request_keys_are_separate() {
        let requests = WindowKey::requests("c", Horizon::Minute, 60);
        let cost = WindowKey::cost("c", 60);
        assert_ne!(requests.to_store_key("ns"), cost.to_store_key("ns"));
    }

    #[test]
    fn test_ttl_is_two_windows() {
        assert_eq!(Horizon::Minute.ttl(), Duration::from_secs(120));
        assert_eq!(Horizon::Hour.ttl(), Duration::from_secs(7_200));
    }
}
