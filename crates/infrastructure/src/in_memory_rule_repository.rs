use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use fluxgate_application::RuleRepository;
use fluxgate_core::AppResult;
use fluxgate_domain::RateLimitRule;

/// In-memory rule repository for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<BTreeMap<String, RateLimitRule>>,
}

impl InMemoryRuleRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn find_all(&self) -> AppResult<Vec<RateLimitRule>> {
        Ok(self.rules.read().await.values().cloned().collect())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<RateLimitRule>> {
        Ok(self.rules.read().await.get(id).cloned())
    }

    async fn find_by_rule_set_id(&self, rule_set_id: &str) -> AppResult<Vec<RateLimitRule>> {
        Ok(self
            .rules
            .read()
            .await
            .values()
            .filter(|rule| rule.rule_set_id() == Some(rule_set_id))
            .cloned()
            .collect())
    }

    async fn exists_by_id(&self, id: &str) -> AppResult<bool> {
        Ok(self.rules.read().await.contains_key(id))
    }

    async fn save(&self, rule: RateLimitRule) -> AppResult<()> {
        self.rules
            .write()
            .await
            .insert(rule.id().as_str().to_owned(), rule);
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> AppResult<bool> {
        Ok(self.rules.write().await.remove(id).is_some())
    }

    async fn delete_by_rule_set_id(&self, rule_set_id: &str) -> AppResult<u64> {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|_, rule| rule.rule_set_id() != Some(rule_set_id));
        Ok(u64::try_from(before.saturating_sub(rules.len())).unwrap_or(u64::MAX))
    }
}
