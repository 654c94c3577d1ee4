use tracing::{debug, info};

use fluxgate_core::{AppError, AppResult};
use fluxgate_domain::{RateLimitRule, RuleChangeScope, RuleId};

use crate::rule_ports::RuleInput;
use crate::storage::bounded_storage_call;

use super::RuleService;
use super::propagation::Committed;
use super::queries::require_rule_set_id;

impl RuleService {
    /// Creates a rule; fails with `AlreadyExists` when the id is taken.
    ///
    /// The existence check and the write are not atomic. Two racing creates
    /// for the same id both pass the check and the later upsert wins.
    pub async fn create(&self, rule_id: &str, input: RuleInput) -> AppResult<RateLimitRule> {
        debug!(rule_id, "creating rule");
        let committed = self.create_committed(rule_id, input).await?;
        Ok(self.propagate(committed).await)
    }

    /// Replaces a rule wholesale; fails with `NotFound` when absent.
    pub async fn update(&self, rule_id: &str, input: RuleInput) -> AppResult<RateLimitRule> {
        debug!(rule_id, "updating rule");
        let committed = self.update_committed(rule_id, input).await?;
        Ok(self.propagate(committed).await)
    }

    /// Flips `enabled` by rebuilding the stored rule.
    ///
    /// Concurrent toggles of one id are last-writer-wins; a lost flip is
    /// recovered by issuing the toggle again.
    pub async fn toggle_enabled(&self, rule_id: &str) -> AppResult<RateLimitRule> {
        debug!(rule_id, "toggling rule");
        let committed = self.toggle_committed(rule_id).await?;
        Ok(self.propagate(committed).await)
    }

    /// Deletes one rule and requests a full reload on success.
    pub async fn delete(&self, rule_id: &str) -> AppResult<()> {
        debug!(rule_id, "deleting rule");
        let committed = self.delete_committed(rule_id).await?;
        self.propagate(committed).await;
        Ok(())
    }

    /// Deletes every member of a rule set. Zero matches is a valid result.
    pub async fn delete_by_rule_set(&self, rule_set_id: &str) -> AppResult<u64> {
        debug!(rule_set_id, "deleting rules for rule set");
        let committed = self.delete_by_rule_set_committed(rule_set_id).await?;
        Ok(self.propagate(committed).await)
    }

    async fn create_committed(
        &self,
        rule_id: &str,
        input: RuleInput,
    ) -> AppResult<Committed<RateLimitRule>> {
        let rule = input.into_rule(rule_id)?;
        let id = rule.id().as_str();

        if bounded_storage_call(
            self.operation_timeout,
            "create",
            self.repository.exists_by_id(id),
        )
        .await?
        {
            return Err(AppError::AlreadyExists(id.to_owned()));
        }

        bounded_storage_call(
            self.operation_timeout,
            "create",
            self.repository.save(rule.clone()),
        )
        .await?;

        info!(rule_id = id, rule_set_id = rule.rule_set_id(), "rule created");
        let scope = RuleChangeScope::for_rule_set(rule.rule_set_id());
        Ok(Committed::new(rule, scope))
    }

    async fn update_committed(
        &self,
        rule_id: &str,
        input: RuleInput,
    ) -> AppResult<Committed<RateLimitRule>> {
        let rule = input.into_rule(rule_id)?;
        let id = rule.id().as_str();

        if !bounded_storage_call(
            self.operation_timeout,
            "update",
            self.repository.exists_by_id(id),
        )
        .await?
        {
            return Err(AppError::NotFound(id.to_owned()));
        }

        bounded_storage_call(
            self.operation_timeout,
            "update",
            self.repository.save(rule.clone()),
        )
        .await?;

        info!(rule_id = id, rule_set_id = rule.rule_set_id(), "rule updated");
        let scope = RuleChangeScope::for_rule_set(rule.rule_set_id());
        Ok(Committed::new(rule, scope))
    }

    async fn toggle_committed(&self, rule_id: &str) -> AppResult<Committed<RateLimitRule>> {
        let rule_id = RuleId::new(rule_id)?;

        let current = bounded_storage_call(
            self.operation_timeout,
            "toggle",
            self.repository.find_by_id(rule_id.as_str()),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(rule_id.to_string()))?;

        let toggled = current.with_enabled(!current.enabled())?;

        bounded_storage_call(
            self.operation_timeout,
            "toggle",
            self.repository.save(toggled.clone()),
        )
        .await?;

        info!(
            rule_id = %rule_id,
            enabled = toggled.enabled(),
            "rule toggled"
        );
        let scope = RuleChangeScope::for_rule_set(toggled.rule_set_id());
        Ok(Committed::new(toggled, scope))
    }

    async fn delete_committed(&self, rule_id: &str) -> AppResult<Committed<()>> {
        let rule_id = RuleId::new(rule_id)?;

        let deleted = bounded_storage_call(
            self.operation_timeout,
            "delete",
            self.repository.delete_by_id(rule_id.as_str()),
        )
        .await?;
        if !deleted {
            return Err(AppError::NotFound(rule_id.to_string()));
        }

        info!(rule_id = %rule_id, "rule deleted");
        Ok(Committed::new((), RuleChangeScope::FullReload))
    }

    async fn delete_by_rule_set_committed(&self, rule_set_id: &str) -> AppResult<Committed<u64>> {
        let rule_set_id = require_rule_set_id(rule_set_id)?;

        let count = bounded_storage_call(
            self.operation_timeout,
            "deleteByRuleSetId",
            self.repository.delete_by_rule_set_id(rule_set_id),
        )
        .await?;

        info!(rule_set_id, deleted_count = count, "rules deleted for rule set");
        Ok(Committed::new(
            count,
            RuleChangeScope::for_rule_set(Some(rule_set_id)),
        ))
    }
}
