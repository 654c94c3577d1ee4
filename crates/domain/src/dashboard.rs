use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::RateLimitRule;

/// Aggregate rule counts shown on the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Number of stored rules.
    pub total_rules: u64,
    /// Number of enabled rules.
    pub active_rules: u64,
    /// Number of disabled rules; always `total_rules - active_rules`.
    pub disabled_rules: u64,
    /// Number of distinct non-empty rule set ids.
    pub total_rule_sets: u64,
    /// When the statistics were computed.
    pub last_updated: DateTime<Utc>,
}

impl DashboardStats {
    /// Computes statistics from one scan of the rule collection.
    #[must_use]
    pub fn from_rules(rules: &[RateLimitRule], last_updated: DateTime<Utc>) -> Self {
        let total_rules = rules.len() as u64;
        let active_rules = rules.iter().filter(|rule| rule.enabled()).count() as u64;
        let rule_sets: HashSet<&str> = rules
            .iter()
            .filter_map(RateLimitRule::rule_set_id)
            .filter(|rule_set_id| !rule_set_id.is_empty())
            .collect();

        Self {
            total_rules,
            active_rules,
            disabled_rules: total_rules - active_rules,
            total_rule_sets: rule_sets.len() as u64,
            last_updated,
        }
    }
}
