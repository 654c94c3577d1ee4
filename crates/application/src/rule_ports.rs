use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use fluxgate_core::AppResult;
use fluxgate_domain::{
    LimitScope, OnLimitExceedPolicy, RateLimitBand, RateLimitRule, RuleAttributes,
    RuleChangeEvent,
};

/// Repository port for durable rule storage.
///
/// Every method may fail with a backend fault; the rule service wraps those
/// as retryable storage failures.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Lists every stored rule.
    async fn find_all(&self) -> AppResult<Vec<RateLimitRule>>;

    /// Finds one rule by identifier.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<RateLimitRule>>;

    /// Lists the members of one rule set.
    async fn find_by_rule_set_id(&self, rule_set_id: &str) -> AppResult<Vec<RateLimitRule>>;

    /// Returns whether a rule with the identifier exists.
    async fn exists_by_id(&self, id: &str) -> AppResult<bool>;

    /// Inserts or replaces a rule by identifier.
    async fn save(&self, rule: RateLimitRule) -> AppResult<()>;

    /// Deletes one rule. Returns `true` iff a rule was removed.
    async fn delete_by_id(&self, id: &str) -> AppResult<bool>;

    /// Deletes every member of a rule set and returns how many were removed.
    async fn delete_by_rule_set_id(&self, rule_set_id: &str) -> AppResult<u64>;
}

/// Port that fans committed rule changes out to enforcement nodes.
///
/// Implementations must deliver at least once and tolerate duplicates.
#[async_trait]
pub trait RuleChangeNotifier: Send + Sync {
    /// Sends one change event.
    async fn notify(&self, event: RuleChangeEvent) -> AppResult<()>;
}

/// Raw band values supplied by an administrative caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitBandInput {
    /// Window length in seconds.
    pub window_seconds: u64,
    /// Requests allowed per window.
    pub capacity: u64,
    /// Optional display label.
    pub label: Option<String>,
}

/// Full rule payload for create and replace operations.
///
/// Replace semantics: fields left empty here are not carried over from the
/// stored rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleInput {
    /// Display name.
    pub name: String,
    /// Enabled flag.
    pub enabled: bool,
    /// Partitioning scope.
    pub scope: LimitScope,
    /// Opaque key strategy identifier.
    pub key_strategy_id: String,
    /// Exceed policy.
    pub on_limit_exceed_policy: OnLimitExceedPolicy,
    /// Ordered bands; must not be empty.
    pub bands: Vec<RateLimitBandInput>,
    /// Optional rule set grouping key.
    pub rule_set_id: Option<String>,
    /// Explicit tags.
    pub tags: Vec<String>,
    /// Free-form metadata; a legacy `"tags"` entry is accepted.
    pub attributes: BTreeMap<String, Value>,
}

impl RuleInput {
    /// Builds the immutable rule this payload describes under `rule_id`.
    pub fn into_rule(self, rule_id: &str) -> AppResult<RateLimitRule> {
        let bands = self
            .bands
            .into_iter()
            .map(|band| RateLimitBand::new(band.window_seconds, band.capacity, band.label))
            .collect::<AppResult<Vec<_>>>()?;

        RateLimitRule::builder(rule_id)
            .name(self.name)
            .enabled(self.enabled)
            .scope(self.scope)
            .key_strategy_id(self.key_strategy_id)
            .on_limit_exceed_policy(self.on_limit_exceed_policy)
            .bands(bands)
            .rule_set_id(self.rule_set_id)
            .attributes(RuleAttributes::new(self.tags, self.attributes)?)
            .build()
    }
}
