use std::fmt::{Display, Formatter};

use fluxgate_core::{AppError, AppResult, NonEmptyString};
use serde::Serialize;

use crate::{LimitScope, OnLimitExceedPolicy, RateLimitBand, RuleAttributes};

/// Stable rule identifier matching `[a-zA-Z0-9-_]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// Creates a validated rule identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(AppError::validation("id", "id is required"));
        }

        if !value
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'))
        {
            return Err(AppError::validation(
                "id",
                "id must contain only alphanumeric characters, hyphens, and underscores",
            ));
        }

        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RuleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Immutable rate-limit rule.
///
/// Instances are only produced by [`RateLimitRuleBuilder::build`]. Changing a
/// rule means seeding a new builder with [`RateLimitRule::to_builder`] and
/// building a replacement value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitRule {
    id: RuleId,
    name: NonEmptyString,
    enabled: bool,
    scope: LimitScope,
    key_strategy_id: NonEmptyString,
    on_limit_exceed_policy: OnLimitExceedPolicy,
    bands: Vec<RateLimitBand>,
    rule_set_id: Option<String>,
    attributes: RuleAttributes,
}

impl RateLimitRule {
    /// Starts a builder for the given rule identifier.
    #[must_use]
    pub fn builder(id: impl Into<String>) -> RateLimitRuleBuilder {
        RateLimitRuleBuilder::new(id)
    }

    /// Returns a builder seeded with every field of this rule.
    #[must_use]
    pub fn to_builder(&self) -> RateLimitRuleBuilder {
        RateLimitRuleBuilder {
            id: self.id.as_str().to_owned(),
            name: Some(self.name.as_str().to_owned()),
            enabled: self.enabled,
            scope: Some(self.scope),
            key_strategy_id: Some(self.key_strategy_id.as_str().to_owned()),
            on_limit_exceed_policy: Some(self.on_limit_exceed_policy),
            bands: self.bands.clone(),
            rule_set_id: self.rule_set_id.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Returns a new rule identical to this one except for `enabled`.
    pub fn with_enabled(&self, enabled: bool) -> AppResult<Self> {
        self.to_builder().enabled(enabled).build()
    }

    /// Returns the rule identifier.
    #[must_use]
    pub fn id(&self) -> &RuleId {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns whether enforcement nodes apply this rule.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the partitioning scope.
    #[must_use]
    pub fn scope(&self) -> LimitScope {
        self.scope
    }

    /// Returns the opaque key strategy identifier.
    #[must_use]
    pub fn key_strategy_id(&self) -> &str {
        self.key_strategy_id.as_str()
    }

    /// Returns the exceed policy.
    #[must_use]
    pub fn on_limit_exceed_policy(&self) -> OnLimitExceedPolicy {
        self.on_limit_exceed_policy
    }

    /// Returns the ordered, non-empty band list.
    #[must_use]
    pub fn bands(&self) -> &[RateLimitBand] {
        &self.bands
    }

    /// Returns the grouping rule set, if any.
    #[must_use]
    pub fn rule_set_id(&self) -> Option<&str> {
        self.rule_set_id.as_deref()
    }

    /// Returns tags and free-form metadata.
    #[must_use]
    pub fn attributes(&self) -> &RuleAttributes {
        &self.attributes
    }
}

/// Validating builder for [`RateLimitRule`].
#[derive(Debug, Clone)]
#[must_use]
pub struct RateLimitRuleBuilder {
    id: String,
    name: Option<String>,
    enabled: bool,
    scope: Option<LimitScope>,
    key_strategy_id: Option<String>,
    on_limit_exceed_policy: Option<OnLimitExceedPolicy>,
    bands: Vec<RateLimitBand>,
    rule_set_id: Option<String>,
    attributes: RuleAttributes,
}

impl RateLimitRuleBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            enabled: true,
            scope: None,
            key_strategy_id: None,
            on_limit_exceed_policy: None,
            bands: Vec::new(),
            rule_set_id: None,
            attributes: RuleAttributes::default(),
        }
    }

    /// Sets the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the enabled flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the partitioning scope.
    pub fn scope(mut self, scope: LimitScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Sets the key strategy identifier.
    pub fn key_strategy_id(mut self, key_strategy_id: impl Into<String>) -> Self {
        self.key_strategy_id = Some(key_strategy_id.into());
        self
    }

    /// Sets the exceed policy.
    pub fn on_limit_exceed_policy(mut self, policy: OnLimitExceedPolicy) -> Self {
        self.on_limit_exceed_policy = Some(policy);
        self
    }

    /// Appends one band; order is preserved.
    pub fn add_band(mut self, band: RateLimitBand) -> Self {
        self.bands.push(band);
        self
    }

    /// Replaces the band list.
    pub fn bands(mut self, bands: Vec<RateLimitBand>) -> Self {
        self.bands = bands;
        self
    }

    /// Sets the rule set grouping key; blank values mean ungrouped.
    pub fn rule_set_id(mut self, rule_set_id: Option<String>) -> Self {
        self.rule_set_id = rule_set_id.filter(|value| !value.trim().is_empty());
        self
    }

    /// Sets tags and metadata.
    pub fn attributes(mut self, attributes: RuleAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Validates every field and returns the immutable rule.
    pub fn build(self) -> AppResult<RateLimitRule> {
        let id = RuleId::new(self.id)?;
        let name = NonEmptyString::new("name", self.name.unwrap_or_default())?;
        let scope = self
            .scope
            .ok_or_else(|| AppError::validation("scope", "scope is required"))?;
        let key_strategy_id =
            NonEmptyString::new("keyStrategyId", self.key_strategy_id.unwrap_or_default())?;
        let on_limit_exceed_policy = self.on_limit_exceed_policy.ok_or_else(|| {
            AppError::validation("onLimitExceedPolicy", "onLimitExceedPolicy is required")
        })?;

        if self.bands.is_empty() {
            return Err(AppError::validation("bands", "bands must not be empty"));
        }

        Ok(RateLimitRule {
            id,
            name,
            enabled: self.enabled,
            scope,
            key_strategy_id,
            on_limit_exceed_policy,
            bands: self.bands,
            rule_set_id: self.rule_set_id,
            attributes: self.attributes,
        })
    }
}
