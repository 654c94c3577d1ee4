mod common;
mod dashboard;
mod rules;

pub use common::{HealthDependencyStatus, HealthResponse};
pub use dashboard::DashboardStatsResponse;
pub use rules::{DeleteRuleSetResponse, RuleListQuery, RuleRequest, RuleResponse, RuleSetQuery};
