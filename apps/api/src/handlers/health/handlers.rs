use super::checks::{check_postgres, check_rule_change_channel};
use super::*;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let postgres = check_postgres(state.postgres_pool.clone()).await;
    let rule_changes = check_rule_change_channel(state.rule_change_channel.clone()).await;

    let ready = is_available(postgres.status) && is_available(rule_changes.status);
    let status = if ready { "ok" } else { "degraded" };
    let http_status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            ready,
            postgres,
            rule_changes,
        }),
    )
}

fn is_available(status: &str) -> bool {
    matches!(status, "ok" | "disabled")
}
