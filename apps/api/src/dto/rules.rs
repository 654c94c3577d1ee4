use std::collections::BTreeMap;

use fluxgate_application::{RateLimitBandInput, RuleInput};
use fluxgate_core::AppError;
use fluxgate_domain::{LimitScope, OnLimitExceedPolicy, RateLimitBand, RateLimitRule};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Incoming payload for rule creation and replacement.
///
/// Missing fields deserialize to empty values so that the domain validation
/// reports them by name.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/rule-request.ts"
)]
pub struct RuleRequest {
    pub id: Option<String>,
    pub name: String,
    pub enabled: Option<bool>,
    pub scope: String,
    pub key_strategy_id: String,
    pub on_limit_exceed_policy: String,
    pub bands: Vec<RateBandRequest>,
    pub rule_set_id: Option<String>,
    pub tags: Option<Vec<String>>,
    #[ts(type = "Record<string, unknown> | null")]
    pub attributes: Option<BTreeMap<String, Value>>,
}

/// Incoming payload for one rate band.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/rate-band-request.ts"
)]
pub struct RateBandRequest {
    #[ts(type = "number")]
    pub window_seconds: i64,
    #[ts(type = "number")]
    pub capacity: i64,
    pub label: Option<String>,
}

/// API representation of a rule.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/rule-response.ts"
)]
pub struct RuleResponse {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub scope: String,
    pub key_strategy_id: String,
    pub on_limit_exceed_policy: String,
    pub bands: Vec<RateBandResponse>,
    pub rule_set_id: Option<String>,
    pub tags: Vec<String>,
    #[ts(type = "Record<string, unknown>")]
    pub attributes: BTreeMap<String, Value>,
}

/// API representation of one rate band.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/rate-band-response.ts"
)]
pub struct RateBandResponse {
    #[ts(type = "number")]
    pub window_seconds: u64,
    #[ts(type = "number")]
    pub capacity: u64,
    pub label: Option<String>,
}

/// Result of deleting a whole rule set.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/delete-rule-set-response.ts"
)]
pub struct DeleteRuleSetResponse {
    pub message: String,
    pub rule_set_id: String,
    #[ts(type = "number")]
    pub deleted_count: u64,
}

/// Optional filter on the rule listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleListQuery {
    pub rule_set_id: Option<String>,
}

/// Required rule set selector for bulk deletion.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetQuery {
    #[serde(default)]
    pub rule_set_id: String,
}

impl RuleRequest {
    /// Returns the body id, which creation requires.
    pub fn required_id(&self) -> Result<&str, AppError> {
        self.id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::validation("id", "id is required"))
    }

    /// Rejects a body id that disagrees with the path id.
    pub fn ensure_id_matches(&self, path_id: &str) -> Result<(), AppError> {
        match self.id.as_deref() {
            Some(body_id) if !body_id.is_empty() && body_id != path_id => Err(
                AppError::validation("id", "body id must match the path id"),
            ),
            _ => Ok(()),
        }
    }
}

impl TryFrom<RuleRequest> for RuleInput {
    type Error = AppError;

    fn try_from(request: RuleRequest) -> Result<Self, Self::Error> {
        let scope = request.scope.parse::<LimitScope>()?;
        let on_limit_exceed_policy = request.on_limit_exceed_policy.parse::<OnLimitExceedPolicy>()?;
        let bands = request
            .bands
            .into_iter()
            .map(RateLimitBandInput::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: request.name,
            enabled: request.enabled.unwrap_or(true),
            scope,
            key_strategy_id: request.key_strategy_id,
            on_limit_exceed_policy,
            bands,
            rule_set_id: request.rule_set_id,
            tags: request.tags.unwrap_or_default(),
            attributes: request.attributes.unwrap_or_default(),
        })
    }
}

impl TryFrom<RateBandRequest> for RateLimitBandInput {
    type Error = AppError;

    fn try_from(request: RateBandRequest) -> Result<Self, Self::Error> {
        let window_seconds = u64::try_from(request.window_seconds).map_err(|_| {
            AppError::validation("bands.windowSeconds", "windowSeconds must be at least 1")
        })?;
        let capacity = u64::try_from(request.capacity)
            .map_err(|_| AppError::validation("bands.capacity", "capacity must be at least 1"))?;

        Ok(Self {
            window_seconds,
            capacity,
            label: request.label,
        })
    }
}

impl From<&RateLimitBand> for RateBandResponse {
    fn from(band: &RateLimitBand) -> Self {
        Self {
            window_seconds: band.window_seconds(),
            capacity: band.capacity(),
            label: band.label().map(ToOwned::to_owned),
        }
    }
}

impl From<RateLimitRule> for RuleResponse {
    fn from(rule: RateLimitRule) -> Self {
        Self {
            id: rule.id().to_string(),
            name: rule.name().to_owned(),
            enabled: rule.enabled(),
            scope: rule.scope().as_str().to_owned(),
            key_strategy_id: rule.key_strategy_id().to_owned(),
            on_limit_exceed_policy: rule.on_limit_exceed_policy().as_str().to_owned(),
            bands: rule.bands().iter().map(RateBandResponse::from).collect(),
            rule_set_id: rule.rule_set_id().map(ToOwned::to_owned),
            tags: rule.attributes().tags().to_vec(),
            attributes: rule.attributes().metadata().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use fluxgate_application::RuleInput;
    use fluxgate_core::AppError;
    use fluxgate_domain::{LimitScope, OnLimitExceedPolicy};
    use serde_json::json;

    use super::RuleRequest;

    fn parse(body: serde_json::Value) -> RuleRequest {
        serde_json::from_value(body).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn camel_case_body_converts_to_rule_input() {
        let request = parse(json!({
            "id": "api-public",
            "name": "Public API",
            "scope": "PER_IP",
            "keyStrategyId": "client-ip",
            "onLimitExceedPolicy": "WAIT_FOR_REFILL",
            "bands": [{ "windowSeconds": 60, "capacity": 100, "label": "minute" }],
            "ruleSetId": "edge",
            "attributes": { "tags": ["beta"], "owner": "platform" }
        }));

        assert!(matches!(request.required_id(), Ok("api-public")));
        let input = RuleInput::try_from(request);
        assert!(input.is_ok());
        let input = input.unwrap_or_else(|_| unreachable!());

        assert!(input.enabled);
        assert_eq!(input.scope, LimitScope::PerIp);
        assert_eq!(input.on_limit_exceed_policy, OnLimitExceedPolicy::WaitForRefill);
        assert_eq!(input.bands[0].window_seconds, 60);
        assert_eq!(input.rule_set_id.as_deref(), Some("edge"));
        assert!(input.attributes.contains_key("tags"));
    }

    #[test]
    fn unknown_scope_literal_is_a_validation_failure() {
        let request = parse(json!({
            "name": "x",
            "scope": "PER_PLANET",
            "keyStrategyId": "k",
            "onLimitExceedPolicy": "REJECT_REQUEST",
            "bands": [{ "windowSeconds": 1, "capacity": 1 }]
        }));

        assert!(matches!(
            RuleInput::try_from(request),
            Err(AppError::Validation { ref field, .. }) if field == "scope"
        ));
    }

    #[test]
    fn negative_band_values_are_validation_failures() {
        let request = parse(json!({
            "name": "x",
            "scope": "GLOBAL",
            "keyStrategyId": "k",
            "onLimitExceedPolicy": "REJECT_REQUEST",
            "bands": [{ "windowSeconds": -5, "capacity": 1 }]
        }));

        assert!(matches!(
            RuleInput::try_from(request),
            Err(AppError::Validation { ref field, .. }) if field == "bands.windowSeconds"
        ));
    }

    #[test]
    fn body_id_must_match_path_id() {
        let request = parse(json!({ "id": "a" }));
        assert!(request.ensure_id_matches("a").is_ok());
        assert!(request.ensure_id_matches("b").is_err());
        assert!(parse(json!({})).ensure_id_matches("b").is_ok());
        assert!(parse(json!({})).required_id().is_err());
    }
}
