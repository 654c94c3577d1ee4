use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch};
use fluxgate_core::AppError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api_config::ApiConfig;
use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState, config: &ApiConfig) -> Result<Router, AppError> {
    let admin_routes = Router::new()
        .route(
            "/api/rules",
            get(handlers::rules::list_rules_handler)
                .post(handlers::rules::create_rule_handler)
                .delete(handlers::rules::delete_rule_set_handler),
        )
        .route(
            "/api/rules/{rule_id}",
            get(handlers::rules::get_rule_handler)
                .put(handlers::rules::update_rule_handler)
                .delete(handlers::rules::delete_rule_handler),
        )
        .route(
            "/api/rules/{rule_id}/toggle",
            patch(handlers::rules::toggle_rule_handler),
        )
        .route(
            "/api/dashboard/stats",
            get(handlers::dashboard::dashboard_stats_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_admin_token,
        ));

    let allowed_origins = config
        .cors_allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|error| {
                AppError::Internal(format!("invalid CORS_ALLOWED_ORIGINS entry '{origin}': {error}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cors_layer = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state))
}
