use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::{created, deleted, updated, AppState};
use crate::database::error::EntityKind;
use crate::database::models::{Chart, NewChart};
use crate::database::partial_update::Patch;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/canvases/:id/charts
pub async fn list_by_canvas(State(state): State<AppState>, Path(canvas_id): Path<Uuid>) -> ApiResult<Vec<Chart>> {
    Ok(ApiResponse::success(state.stores.charts.list_by_canvas(canvas_id).await?))
}

/// POST /api/canvases/:id/charts
pub async fn create(
    State(state): State<AppState>,
    Path(canvas_id): Path<Uuid>,
    payload: Result<Json<NewChart>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(new) = payload?;
    created(state.stores.charts.create(canvas_id, &new).await?)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Chart> {
    Ok(ApiResponse::success(state.stores.charts.get_by_id(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<Patch>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(patch) = payload?;
    updated(EntityKind::Chart, id, state.stores.charts.update(id, &patch).await?)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    deleted(EntityKind::Chart, id, state.stores.charts.delete(id).await?)
}
