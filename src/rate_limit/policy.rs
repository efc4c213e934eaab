use crate::config::{LimitsConfig, ToolConfig};
use serde::Serialize;
use std::collections::HashMap;

/// Effective count limits for one tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaLimits {
    /// Minute limit, burst allowance included
    pub per_minute: u64,
    pub per_hour: u64,
    /// Burst share of `per_minute`
    pub burst_allowance: u64,
}

/// Multiplier and cost for a known tool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolProfile {
    pub multiplier: f64,
    pub cost: Option<u64>,
}

impl From<&ToolConfig> for ToolProfile {
    fn from(config: &ToolConfig) -> Self {
        Self {
            multiplier: config.multiplier,
            cost: config.cost,
        }
    }
}

/// Per-tool limit and cost lookup
///
/// Built once at startup and shared read-only behind an `Arc`; reloading
/// means building a new policy, never mutating this one.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    base_per_minute: u64,
    base_per_hour: u64,
    base_burst: u64,
    cost_budget: u64,
    default_cost: u64,
    tools: HashMap<String, ToolProfile>,
}

impl QuotaPolicy {
    pub fn new(limits: &LimitsConfig, tools: &HashMap<String, ToolConfig>) -> Self {
        Self {
            base_per_minute: limits.per_minute,
            base_per_hour: limits.per_hour,
            base_burst: limits.burst,
            cost_budget: limits.cost_budget,
            default_cost: limits.default_cost,
            tools: tools
                .iter()
                .map(|(name, tool)| (name.clone(), ToolProfile::from(tool)))
                .collect(),
        }
    }

    /// Quota multiplier for a tool (1.0 when unknown)
    pub fn multiplier_for(&self, operation: &str) -> f64 {
        self.tools
            .get(operation)
            .map(|t| t.multiplier)
            .unwrap_or(1.0)
    }

    /// Effective limits: `floor(base * multiplier)`, burst added to the minute limit only
    pub fn limits_for(&self, operation: &str) -> QuotaLimits {
        let multiplier = self.multiplier_for(operation);
        let scale = |base: u64| (base as f64 * multiplier).floor() as u64;

        let burst_allowance = scale(self.base_burst);
        QuotaLimits {
            per_minute: scale(self.base_per_minute) + burst_allowance,
            per_hour: scale(self.base_per_hour),
            burst_allowance,
        }
    }

    /// Cost weight charged against the minute budget
    pub fn cost_for(&self, operation: &str) -> u64 {
        self.tools
            .get(operation)
            .and_then(|t| t.cost)
            .unwrap_or(self.default_cost)
    }

    /// Total cost a client may spend per minute
    pub fn cost_budget(&self) -> u64 {
        self.cost_budget
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self::new(&LimitsConfig::default(), &HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> QuotaPolicy {
        let mut tools = HashMap::new();
        tools.insert(
            "skills".to_string(),
            ToolConfig {
                multiplier: 2.0,
                cost: None,
            },
        );
        tools.insert(
            "search".to_string(),
            ToolConfig {
                multiplier: 0.5,
                cost: Some(5),
            },
        );
        QuotaPolicy::new(&LimitsConfig::default(), &tools)
    }

    #[test]
    fn test_unknown_tool_uses_base_limits() {
        let limits = policy().limits_for("whatever");
        assert_eq!(limits.per_minute, 20);
        assert_eq!(limits.per_hour, 90);
        assert_eq!(limits.burst_allowance, 5);
    }

    #[test]
    fn test_multiplier_scales_limits_and_burst() {
        let limits = policy().limits_for("skills");
        assert_eq!(limits.per_minute, 40);
        assert_eq!(limits.per_hour, 180);
        assert_eq!(limits.burst_allowance, 10);
    }

    #[test]
    fn test_fractional_multiplier_floors_each_part() {
        // 15 * 0.5 = 7.5 -> 7, 5 * 0.5 = 2.5 -> 2
        let limits = policy().limits_for("search");
        assert_eq!(limits.per_minute, 9);
        assert_eq!(limits.per_hour, 45);
        assert_eq!(limits.burst_allowance, 2);
    }

    #[test]
    fn test_cost_lookup() {
        let policy = policy();
        assert_eq!(policy.cost_for("search"), 5);
        assert_eq!(policy.cost_for("skills"), 1);
        assert_eq!(policy.cost_for("unknown"), 1);
        assert_eq!(policy.cost_budget(), 50);
    }

    #[test]
    fn test_default_policy() {
        let policy = QuotaPolicy::default();
        assert_eq!(policy.multiplier_for("anything"), 1.0);
        assert_eq!(policy.limits_for("anything").per_minute, 20);
    }
}
