use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How much of its rule cache an enforcement node must refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleChangeScope {
    /// Members of one rule set changed.
    RuleSet {
        /// Rule set whose latest state is authoritative.
        rule_set_id: String,
    },
    /// A rule without a rule set changed.
    Ungrouped,
    /// Rebuild the whole cache.
    FullReload,
}

impl RuleChangeScope {
    /// Returns the scoped variant for an optional rule set id.
    #[must_use]
    pub fn for_rule_set(rule_set_id: Option<&str>) -> Self {
        match rule_set_id {
            Some(rule_set_id) if !rule_set_id.trim().is_empty() => Self::RuleSet {
                rule_set_id: rule_set_id.to_owned(),
            },
            _ => Self::Ungrouped,
        }
    }

    /// Returns the stable scope type value.
    #[must_use]
    pub fn scope_type(&self) -> &'static str {
        match self {
            Self::RuleSet { .. } => "rule_set",
            Self::Ungrouped => "ungrouped",
            Self::FullReload => "full_reload",
        }
    }

    /// Returns the rule set id for scoped changes.
    #[must_use]
    pub fn rule_set_id(&self) -> Option<&str> {
        match self {
            Self::RuleSet { rule_set_id } => Some(rule_set_id.as_str()),
            Self::Ungrouped | Self::FullReload => None,
        }
    }
}

/// Change signal emitted after a committed rule mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleChangeEvent {
    event_id: Uuid,
    scope: RuleChangeScope,
    emitted_at: DateTime<Utc>,
}

impl RuleChangeEvent {
    /// Creates a new event for the given scope.
    #[must_use]
    pub fn new(scope: RuleChangeScope) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            scope,
            emitted_at: Utc::now(),
        }
    }

    /// Returns the unique event identifier, usable for de-duplication.
    #[must_use]
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Returns the propagation scope.
    #[must_use]
    pub fn scope(&self) -> &RuleChangeScope {
        &self.scope
    }

    /// Returns when the event was emitted.
    #[must_use]
    pub fn emitted_at(&self) -> DateTime<Utc> {
        self.emitted_at
    }
}
