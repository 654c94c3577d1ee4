use chrono::SecondsFormat;
use fluxgate_domain::DashboardStats;
use serde::Serialize;
use ts_rs::TS;

/// Aggregate rule counts for the admin dashboard.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/dashboard-stats-response.ts"
)]
pub struct DashboardStatsResponse {
    #[ts(type = "number")]
    pub total_rules: u64,
    #[ts(type = "number")]
    pub active_rules: u64,
    #[ts(type = "number")]
    pub disabled_rules: u64,
    #[ts(type = "number")]
    pub total_rule_sets: u64,
    pub last_updated: String,
}

impl From<DashboardStats> for DashboardStatsResponse {
    fn from(stats: DashboardStats) -> Self {
        Self {
            total_rules: stats.total_rules,
            active_rules: stats.active_rules,
            disabled_rules: stats.disabled_rules,
            total_rule_sets: stats.total_rule_sets,
            last_updated: stats
                .last_updated
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
