//! Domain entities and invariants for rate-limit rule administration.

#![forbid(unsafe_code)]

mod attributes;
mod band;
mod change;
mod dashboard;
mod policy;
mod rule;

pub use attributes::{LEGACY_TAGS_KEY, RuleAttributes};
pub use band::RateLimitBand;
pub use change::{RuleChangeEvent, RuleChangeScope};
pub use dashboard::DashboardStats;
pub use policy::{LimitScope, OnLimitExceedPolicy};
pub use rule::{RateLimitRule, RateLimitRuleBuilder, RuleId};
