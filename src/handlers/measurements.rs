use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::{created, deleted, updated, AppState};
use crate::database::error::EntityKind;
use crate::database::models::{Measurement, NewMeasurement};
use crate::database::partial_update::Patch;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/charts/:id/measurements
pub async fn list_by_chart(State(state): State<AppState>, Path(chart_id): Path<Uuid>) -> ApiResult<Vec<Measurement>> {
    Ok(ApiResponse::success(state.stores.measurements.list_by_chart(chart_id).await?))
}

/// POST /api/charts/:id/measurements
pub async fn create(
    State(state): State<AppState>,
    Path(chart_id): Path<Uuid>,
    payload: Result<Json<NewMeasurement>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(new) = payload?;
    created(state.stores.measurements.create(chart_id, &new).await?)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Measurement> {
    Ok(ApiResponse::success(state.stores.measurements.get_by_id(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<Patch>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(patch) = payload?;
    updated(EntityKind::Measurement, id, state.stores.measurements.update(id, &patch).await?)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    deleted(EntityKind::Measurement, id, state.stores.measurements.delete(id).await?)
}
