use tracing::debug;

use fluxgate_core::{AppError, AppResult};
use fluxgate_domain::{RateLimitRule, RuleId};

use crate::storage::bounded_storage_call;

use super::RuleService;

impl RuleService {
    /// Lists every rule.
    pub async fn list_all(&self) -> AppResult<Vec<RateLimitRule>> {
        debug!("fetching all rules");
        bounded_storage_call(
            self.operation_timeout,
            "findAll",
            self.repository.find_all(),
        )
        .await
    }

    /// Lists the members of one rule set.
    pub async fn list_by_rule_set(&self, rule_set_id: &str) -> AppResult<Vec<RateLimitRule>> {
        let rule_set_id = require_rule_set_id(rule_set_id)?;
        debug!(rule_set_id, "fetching rules for rule set");
        bounded_storage_call(
            self.operation_timeout,
            "findByRuleSetId",
            self.repository.find_by_rule_set_id(rule_set_id),
        )
        .await
    }

    /// Returns one rule or `NotFound`.
    pub async fn get_by_id(&self, rule_id: &str) -> AppResult<RateLimitRule> {
        let rule_id = RuleId::new(rule_id)?;
        debug!(rule_id = %rule_id, "fetching rule");
        bounded_storage_call(
            self.operation_timeout,
            "findById",
            self.repository.find_by_id(rule_id.as_str()),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(rule_id.to_string()))
    }
}

pub(super) fn require_rule_set_id(rule_set_id: &str) -> AppResult<&str> {
    if rule_set_id.trim().is_empty() {
        return Err(AppError::validation("ruleSetId", "ruleSetId is required"));
    }

    Ok(rule_set_id)
}
