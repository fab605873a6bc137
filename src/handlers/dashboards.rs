use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::{created, deleted, updated, AppState};
use crate::database::error::EntityKind;
use crate::database::models::{Dashboard, NewDashboard};
use crate::database::partial_update::Patch;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/dashboards
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Dashboard>> {
    Ok(ApiResponse::success(state.stores.dashboards.list().await?))
}

/// GET /api/templates/:id/dashboards
pub async fn list_by_template(State(state): State<AppState>, Path(template_id): Path<Uuid>) -> ApiResult<Vec<Dashboard>> {
    Ok(ApiResponse::success(state.stores.dashboards.list_by_template(template_id).await?))
}

/// POST /api/dashboards
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewDashboard>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(new) = payload?;
    created(state.stores.dashboards.create(&new).await?)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Dashboard> {
    Ok(ApiResponse::success(state.stores.dashboards.get_by_id(id).await?))
}

/// GET /api/share/:share_id - published dashboards only; counts a view
pub async fn shared(State(state): State<AppState>, Path(share_id): Path<Uuid>) -> ApiResult<Dashboard> {
    state
        .stores
        .dashboards
        .get_by_share_id(share_id)
        .await?
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found(format!("no published dashboard for share link {}", share_id)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<Patch>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(patch) = payload?;
    updated(EntityKind::Dashboard, id, state.stores.dashboards.update(id, &patch).await?)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    deleted(EntityKind::Dashboard, id, state.stores.dashboards.delete(id).await?)
}
