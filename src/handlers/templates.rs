use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::{created, deleted, updated, AppState};
use crate::database::error::EntityKind;
use crate::database::models::{NewTemplate, Template};
use crate::database::partial_update::Patch;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{SaveTemplateRequest, TemplateTree};

/// GET /api/templates
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Template>> {
    Ok(ApiResponse::success(state.stores.templates.list().await?))
}

/// POST /api/templates - template row only, no children
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewTemplate>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(new) = payload?;
    created(state.stores.templates.create(&new).await?)
}

/// POST /api/templates/tree - template with all canvases, charts and measurements, atomically
pub async fn save_tree(
    State(state): State<AppState>,
    payload: Result<Json<SaveTemplateRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    created(state.writer.save_template(request).await?)
}

/// GET /api/templates/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Template> {
    Ok(ApiResponse::success(state.stores.templates.get_by_id(id).await?))
}

/// GET /api/templates/:id/tree
pub async fn tree(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<TemplateTree> {
    Ok(ApiResponse::success(state.writer.load_tree(id).await?))
}

/// PATCH /api/templates/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<Patch>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(patch) = payload?;
    updated(EntityKind::Template, id, state.stores.templates.update(id, &patch).await?)
}

/// DELETE /api/templates/:id - soft delete
pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    deleted(EntityKind::Template, id, state.stores.templates.delete(id).await?)
}
