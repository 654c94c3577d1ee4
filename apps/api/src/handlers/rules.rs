use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use fluxgate_application::RuleInput;

use crate::dto::{DeleteRuleSetResponse, RuleListQuery, RuleRequest, RuleResponse, RuleSetQuery};
use crate::error::ApiResult;
use crate::state::AppState;


pub async fn list_rules_handler(
    State(state): State<AppState>,
    Query(query): Query<RuleListQuery>,
) -> ApiResult<Json<Vec<RuleResponse>>> {
    let rules = match query.rule_set_id.as_deref().filter(|id| !id.is_empty()) {
        Some(rule_set_id) => state.rule_service.list_by_rule_set(rule_set_id).await?,
        None => state.rule_service.list_all().await?,
    };

    Ok(Json(rules.into_iter().map(RuleResponse::from).collect()))
}

pub async fn get_rule_handler(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> ApiResult<Json<RuleResponse>> {
    let rule = state.rule_service.get_by_id(rule_id.as_str()).await?;
    Ok(Json(RuleResponse::from(rule)))
}

pub async fn create_rule_handler(
    State(state): State<AppState>,
    Json(payload): Json<RuleRequest>,
) -> ApiResult<(StatusCode, Json<RuleResponse>)> {
    let rule_id = payload.required_id()?.to_owned();
    let input = RuleInput::try_from(payload)?;

    let rule = state.rule_service.create(rule_id.as_str(), input).await?;
    Ok((StatusCode::CREATED, Json(RuleResponse::from(rule))))
}

pub async fn update_rule_handler(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    Json(payload): Json<RuleRequest>,
) -> ApiResult<Json<RuleResponse>> {
    payload.ensure_id_matches(rule_id.as_str())?;
    let input = RuleInput::try_from(payload)?;

    let rule = state.rule_service.update(rule_id.as_str(), input).await?;
    Ok(Json(RuleResponse::from(rule)))
}

pub async fn toggle_rule_handler(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> ApiResult<Json<RuleResponse>> {
    let rule = state.rule_service.toggle_enabled(rule_id.as_str()).await?;
    Ok(Json(RuleResponse::from(rule)))
}

pub async fn delete_rule_handler(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.rule_service.delete(rule_id.as_str()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_rule_set_handler(
    State(state): State<AppState>,
    Query(query): Query<RuleSetQuery>,
) -> ApiResult<Json<DeleteRuleSetResponse>> {
    let deleted_count = state
        .rule_service
        .delete_by_rule_set(query.rule_set_id.as_str())
        .await?;

    Ok(Json(DeleteRuleSetResponse {
        message: "Rules deleted successfully".to_owned(),
        rule_set_id: query.rule_set_id,
        deleted_count,
    }))
}
