use fluxgate_application::{DashboardService, RuleService};
use sqlx::PgPool;

/// Redis channel the rule change notifier publishes to.
#[derive(Clone)]
pub struct RuleChangeChannel {
    pub client: redis::Client,
    pub name: String,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub rule_service: RuleService,
    pub dashboard_service: DashboardService,
    pub admin_api_token: Option<String>,
    pub postgres_pool: Option<PgPool>,
    /// Present only when rule changes are published over Redis.
    pub rule_change_channel: Option<RuleChangeChannel>,
}
