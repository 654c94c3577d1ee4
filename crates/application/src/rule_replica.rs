//! Enforcement-side rule cache kept in sync with change events.
//!
//! Each refresh builds a complete new [`RuleSnapshot`] and swaps the shared
//! pointer; readers holding an older snapshot keep a consistent view. Scoped
//! events are a latency shortcut, periodic [`RuleReplica::full_reload`] is
//! what guarantees convergence.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use fluxgate_core::AppResult;
use fluxgate_domain::{RateLimitRule, RuleChangeScope};

use crate::rule_ports::RuleRepository;
use crate::storage::{DEFAULT_OPERATION_TIMEOUT, bounded_storage_call};

/// One immutable generation of the replicated rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    generation: u64,
    rules: BTreeMap<String, RateLimitRule>,
}

impl RuleSnapshot {
    /// Returns the monotonically increasing generation number.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the number of cached rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns whether the snapshot holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Looks up one cached rule.
    #[must_use]
    pub fn get(&self, rule_id: &str) -> Option<&RateLimitRule> {
        self.rules.get(rule_id)
    }

    /// Iterates cached rules ordered by id.
    pub fn rules(&self) -> impl Iterator<Item = &RateLimitRule> {
        self.rules.values()
    }

    /// Iterates enabled rules ordered by id.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &RateLimitRule> {
        self.rules.values().filter(|rule| rule.enabled())
    }
}

/// Replica of the rule repository for one enforcement node.
pub struct RuleReplica {
    repository: Arc<dyn RuleRepository>,
    current: RwLock<Arc<RuleSnapshot>>,
    rebuild: Mutex<()>,
    operation_timeout: Duration,
}

impl RuleReplica {
    /// Creates an empty replica; call [`RuleReplica::full_reload`] to seed it.
    #[must_use]
    pub fn new(repository: Arc<dyn RuleRepository>) -> Self {
        Self {
            repository,
            current: RwLock::new(Arc::new(RuleSnapshot::default())),
            rebuild: Mutex::new(()),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Bounds every repository read by `timeout`.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Returns the current snapshot.
    pub async fn current(&self) -> Arc<RuleSnapshot> {
        self.current.read().await.clone()
    }

    /// Refreshes the part of the cache named by `scope`.
    pub async fn apply(&self, scope: &RuleChangeScope) -> AppResult<Arc<RuleSnapshot>> {
        match scope {
            RuleChangeScope::RuleSet { rule_set_id } => self.reload_rule_set(rule_set_id).await,
            RuleChangeScope::Ungrouped | RuleChangeScope::FullReload => self.full_reload().await,
        }
    }

    /// Rebuilds the cache from every stored rule.
    pub async fn full_reload(&self) -> AppResult<Arc<RuleSnapshot>> {
        let _guard = self.rebuild.lock().await;

        let rules = bounded_storage_call(
            self.operation_timeout,
            "findAll",
            self.repository.find_all(),
        )
        .await?;

        let rules = rules
            .into_iter()
            .map(|rule| (rule.id().as_str().to_owned(), rule))
            .collect();
        let snapshot = self.swap(rules).await;

        info!(
            generation = snapshot.generation(),
            rule_count = snapshot.len(),
            "rule replica fully reloaded"
        );
        Ok(snapshot)
    }

    async fn reload_rule_set(&self, rule_set_id: &str) -> AppResult<Arc<RuleSnapshot>> {
        let _guard = self.rebuild.lock().await;

        let members = bounded_storage_call(
            self.operation_timeout,
            "findByRuleSetId",
            self.repository.find_by_rule_set_id(rule_set_id),
        )
        .await?;

        let mut rules = self.current().await.rules.clone();
        rules.retain(|_, rule| rule.rule_set_id() != Some(rule_set_id));
        let member_count = members.len();
        rules.extend(
            members
                .into_iter()
                .map(|rule| (rule.id().as_str().to_owned(), rule)),
        );
        let snapshot = self.swap(rules).await;

        debug!(
            rule_set_id,
            member_count,
            generation = snapshot.generation(),
            "rule replica refreshed rule set"
        );
        Ok(snapshot)
    }

    async fn swap(&self, rules: BTreeMap<String, RateLimitRule>) -> Arc<RuleSnapshot> {
        let mut current = self.current.write().await;
        let snapshot = Arc::new(RuleSnapshot {
            generation: current.generation.saturating_add(1),
            rules,
        });
        *current = snapshot.clone();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use fluxgate_core::{AppError, AppResult};
    use fluxgate_domain::{
        LimitScope, OnLimitExceedPolicy, RateLimitBand, RateLimitRule, RuleChangeScope,
    };

    use crate::rule_ports::RuleRepository;

    use super::RuleReplica;

    #[derive(Default)]
    struct FakeRuleRepository {
        rules: Mutex<BTreeMap<String, RateLimitRule>>,
    }

    impl FakeRuleRepository {
        async fn put(&self, rule: RateLimitRule) {
            self.rules
                .lock()
                .await
                .insert(rule.id().as_str().to_owned(), rule);
        }

        async fn remove(&self, id: &str) {
            self.rules.lock().await.remove(id);
        }
    }

    #[async_trait]
    impl RuleRepository for FakeRuleRepository {
        async fn find_all(&self) -> AppResult<Vec<RateLimitRule>> {
            Ok(self.rules.lock().await.values().cloned().collect())
        }

        async fn find_by_id(&self, id: &str) -> AppResult<Option<RateLimitRule>> {
            Ok(self.rules.lock().await.get(id).cloned())
        }

        async fn find_by_rule_set_id(&self, rule_set_id: &str) -> AppResult<Vec<RateLimitRule>> {
            Ok(self
                .rules
                .lock()
                .await
                .values()
                .filter(|rule| rule.rule_set_id() == Some(rule_set_id))
                .cloned()
                .collect())
        }

        async fn exists_by_id(&self, id: &str) -> AppResult<bool> {
            Ok(self.rules.lock().await.contains_key(id))
        }

        async fn save(&self, rule: RateLimitRule) -> AppResult<()> {
            self.put(rule).await;
            Ok(())
        }

        async fn delete_by_id(&self, _id: &str) -> AppResult<bool> {
            Err(AppError::Internal("read-only fake".to_owned()))
        }

        async fn delete_by_rule_set_id(&self, _rule_set_id: &str) -> AppResult<u64> {
            Err(AppError::Internal("read-only fake".to_owned()))
        }
    }

    fn rule(id: &str, rule_set_id: Option<&str>, capacity: u64) -> RateLimitRule {
        RateLimitRule::builder(id)
            .name(id)
            .scope(LimitScope::PerApiKey)
            .key_strategy_id("api-key")
            .on_limit_exceed_policy(OnLimitExceedPolicy::WaitForRefill)
            .add_band(RateLimitBand::new(60, capacity, None).unwrap_or_else(|_| unreachable!()))
            .rule_set_id(rule_set_id.map(str::to_owned))
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn scoped_refresh_replaces_only_that_rule_set() {
        let repository = Arc::new(FakeRuleRepository::default());
        repository.put(rule("a1", Some("a"), 10)).await;
        repository.put(rule("a2", Some("a"), 10)).await;
        repository.put(rule("b1", Some("b"), 10)).await;

        let replica = RuleReplica::new(repository.clone());
        assert!(replica.full_reload().await.is_ok());

        repository.remove("a2").await;
        repository.put(rule("a1", Some("a"), 99)).await;
        repository.put(rule("b1", Some("b"), 99)).await;

        let snapshot = replica
            .apply(&RuleChangeScope::for_rule_set(Some("a")))
            .await;
        assert!(snapshot.is_ok());
        let snapshot = snapshot.unwrap_or_else(|_| unreachable!());

        assert_eq!(snapshot.generation(), 2);
        assert!(snapshot.get("a2").is_none());
        assert_eq!(
            snapshot.get("a1").map(|rule| rule.bands()[0].capacity()),
            Some(99)
        );
        // b was not refreshed and still shows the old capacity.
        assert_eq!(
            snapshot.get("b1").map(|rule| rule.bands()[0].capacity()),
            Some(10)
        );
    }

    #[tokio::test]
    async fn concurrent_full_reloads_converge_to_the_same_rules() {
        let repository = Arc::new(FakeRuleRepository::default());
        repository.put(rule("r1", Some("a"), 10)).await;
        repository.put(rule("r2", None, 10)).await;

        let replica = Arc::new(RuleReplica::new(repository));
        let (first, second) = tokio::join!(
            replica.apply(&RuleChangeScope::FullReload),
            replica.apply(&RuleChangeScope::FullReload)
        );
        assert!(first.is_ok());
        assert!(second.is_ok());

        let snapshot = replica.current().await;
        assert_eq!(snapshot.generation(), 2);
        let ids: Vec<&str> = snapshot.rules().map(|rule| rule.id().as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn readers_keep_their_snapshot_across_swaps() {
        let repository = Arc::new(FakeRuleRepository::default());
        repository.put(rule("r1", None, 10)).await;

        let replica = RuleReplica::new(repository.clone());
        assert!(replica.full_reload().await.is_ok());
        let held = replica.current().await;

        repository.remove("r1").await;
        assert!(replica.apply(&RuleChangeScope::Ungrouped).await.is_ok());

        assert_eq!(held.len(), 1);
        assert!(replica.current().await.is_empty());
    }

    #[tokio::test]
    async fn enabled_rules_skips_disabled_entries() {
        let repository = Arc::new(FakeRuleRepository::default());
        repository.put(rule("r1", Some("a"), 10)).await;
        let disabled = rule("r2", Some("a"), 10)
            .with_enabled(false)
            .unwrap_or_else(|_| unreachable!());
        repository.put(disabled).await;

        let replica = RuleReplica::new(repository);
        let snapshot = replica.full_reload().await;
        assert!(snapshot.is_ok());
        let snapshot = snapshot.unwrap_or_else(|_| unreachable!());

        let enabled: Vec<&str> = snapshot
            .enabled_rules()
            .map(|rule| rule.id().as_str())
            .collect();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(enabled, vec!["r1"]);
    }
}
