use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::{created, deleted, updated, AppState};
use crate::database::error::EntityKind;
use crate::database::models::{Canvas, NewCanvas};
use crate::database::partial_update::Patch;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/templates/:id/canvases
pub async fn list_by_template(State(state): State<AppState>, Path(template_id): Path<Uuid>) -> ApiResult<Vec<Canvas>> {
    Ok(ApiResponse::success(state.stores.canvases.list_by_template(template_id).await?))
}

/// POST /api/templates/:id/canvases - appended after existing canvases
pub async fn create(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    payload: Result<Json<NewCanvas>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(new) = payload?;
    created(state.stores.canvases.create(template_id, &new).await?)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Canvas> {
    Ok(ApiResponse::success(state.stores.canvases.get_by_id(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<Patch>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(patch) = payload?;
    updated(EntityKind::Canvas, id, state.stores.canvases.update(id, &patch).await?)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    deleted(EntityKind::Canvas, id, state.stores.canvases.delete(id).await?)
}
