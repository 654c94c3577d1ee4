//! PostgreSQL-backed rule repository using the `rate_limit_rules` table.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

use fluxgate_application::RuleRepository;
use fluxgate_core::{AppError, AppResult};
use fluxgate_domain::{
    LimitScope, OnLimitExceedPolicy, RateLimitBand, RateLimitRule, RuleAttributes,
};

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        name,
        enabled,
        scope,
        key_strategy_id,
        on_limit_exceed_policy,
        bands,
        rule_set_id,
        tags,
        attributes
    FROM rate_limit_rules
"#;

/// PostgreSQL implementation of the rule repository port.
#[derive(Clone)]
pub struct PostgresRuleRepository {
    pool: PgPool,
}

impl PostgresRuleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleRepository for PostgresRuleRepository {
    async fn find_all(&self) -> AppResult<Vec<RateLimitRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list rules: {error}")))?;

        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<RateLimitRule>> {
        let row = sqlx::query_as::<_, RuleRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to find rule '{id}': {error}")))?;

        row.map(RuleRow::into_rule).transpose()
    }

    async fn find_by_rule_set_id(&self, rule_set_id: &str) -> AppResult<Vec<RateLimitRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            "{SELECT_COLUMNS} WHERE rule_set_id = $1 ORDER BY id"
        ))
        .bind(rule_set_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list rules for rule set '{rule_set_id}': {error}"
            ))
        })?;

        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    async fn exists_by_id(&self, id: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM rate_limit_rules WHERE id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to check rule '{id}' existence: {error}"))
        })
    }

    async fn save(&self, rule: RateLimitRule) -> AppResult<()> {
        let bands: Vec<BandRecord> = rule.bands().iter().map(BandRecord::from).collect();
        let tags = rule.attributes().tags().to_vec();
        let metadata = rule.attributes().metadata().clone();

        sqlx::query(
            r#"
            INSERT INTO rate_limit_rules (
                id,
                name,
                enabled,
                scope,
                key_strategy_id,
                on_limit_exceed_policy,
                bands,
                rule_set_id,
                tags,
                attributes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE
            SET
                name = EXCLUDED.name,
                enabled = EXCLUDED.enabled,
                scope = EXCLUDED.scope,
                key_strategy_id = EXCLUDED.key_strategy_id,
                on_limit_exceed_policy = EXCLUDED.on_limit_exceed_policy,
                bands = EXCLUDED.bands,
                rule_set_id = EXCLUDED.rule_set_id,
                tags = EXCLUDED.tags,
                attributes = EXCLUDED.attributes,
                updated_at = now()
            "#,
        )
        .bind(rule.id().as_str())
        .bind(rule.name())
        .bind(rule.enabled())
        .bind(rule.scope().as_str())
        .bind(rule.key_strategy_id())
        .bind(rule.on_limit_exceed_policy().as_str())
        .bind(Json(bands))
        .bind(rule.rule_set_id())
        .bind(tags)
        .bind(Json(metadata))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save rule '{}': {error}", rule.id()))
        })?;

        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM rate_limit_rules
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete rule '{id}': {error}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_rule_set_id(&self, rule_set_id: &str) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM rate_limit_rules
            WHERE rule_set_id = $1
            "#,
        )
        .bind(rule_set_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete rules for rule set '{rule_set_id}': {error}"
            ))
        })?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BandRecord {
    window_seconds: u64,
    capacity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

impl From<&RateLimitBand> for BandRecord {
    fn from(band: &RateLimitBand) -> Self {
        Self {
            window_seconds: band.window_seconds(),
            capacity: band.capacity(),
            label: band.label().map(str::to_owned),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: String,
    name: String,
    enabled: bool,
    scope: String,
    key_strategy_id: String,
    on_limit_exceed_policy: String,
    bands: Json<Vec<BandRecord>>,
    rule_set_id: Option<String>,
    tags: Vec<String>,
    attributes: Json<BTreeMap<String, Value>>,
}

impl RuleRow {
    fn into_rule(self) -> AppResult<RateLimitRule> {
        let id = self.id;
        let invalid =
            |error: AppError| AppError::Internal(format!("stored rule '{id}' is invalid: {error}"));

        let bands = self
            .bands
            .0
            .into_iter()
            .map(|band| RateLimitBand::new(band.window_seconds, band.capacity, band.label))
            .collect::<AppResult<Vec<_>>>()
            .map_err(invalid)?;
        let scope = self.scope.parse::<LimitScope>().map_err(invalid)?;
        let policy = self
            .on_limit_exceed_policy
            .parse::<OnLimitExceedPolicy>()
            .map_err(invalid)?;
        let attributes = RuleAttributes::new(self.tags, self.attributes.0).map_err(invalid)?;

        RateLimitRule::builder(id.as_str())
            .name(self.name)
            .enabled(self.enabled)
            .scope(scope)
            .key_strategy_id(self.key_strategy_id)
            .on_limit_exceed_policy(policy)
            .bands(bands)
            .rule_set_id(self.rule_set_id)
            .attributes(attributes)
            .build()
            .map_err(invalid)
    }
}
