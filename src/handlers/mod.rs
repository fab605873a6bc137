//! HTTP surface. Every route is a thin wrapper over a store or the template writer;
//! errors convert into `ApiError` with `?`.

pub mod canvases;
pub mod charts;
pub mod dashboards;
pub mod health;
pub mod measurements;
pub mod templates;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::{AppConfig, SecurityConfig};
use crate::database::error::{Affected, EntityKind};
use crate::database::stores::Stores;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TemplateWriter;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub stores: Stores,
    pub writer: TemplateWriter,
}

impl AppState {
    pub fn new(pool: PgPool, config: &AppConfig) -> Self {
        let writer = TemplateWriter::new(pool.clone(), config.content.max_bytes)
            .with_timeout(config.database.transaction_timeout());
        Self {
            stores: Stores::new(pool.clone(), config.content.max_bytes),
            writer,
            pool,
        }
    }
}

pub fn router(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .merge(template_routes())
        .merge(canvas_routes())
        .merge(chart_routes())
        .merge(measurement_routes())
        .merge(dashboard_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.security)),
        )
        .with_state(state)
}

fn template_routes() -> Router<AppState> {
    Router::new()
        .route("/api/templates", get(templates::list).post(templates::create))
        // Cascading create of a whole tree
        .route("/api/templates/tree", post(templates::save_tree))
        .route(
            "/api/templates/:id",
            get(templates::get).patch(templates::update).delete(templates::delete),
        )
        .route("/api/templates/:id/tree", get(templates::tree))
        .route(
            "/api/templates/:id/canvases",
            get(canvases::list_by_template).post(canvases::create),
        )
        .route("/api/templates/:id/dashboards", get(dashboards::list_by_template))
}

fn canvas_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/canvases/:id",
            get(canvases::get).patch(canvases::update).delete(canvases::delete),
        )
        .route("/api/canvases/:id/charts", get(charts::list_by_canvas).post(charts::create))
}

fn chart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/charts/:id",
            get(charts::get).patch(charts::update).delete(charts::delete),
        )
        .route(
            "/api/charts/:id/measurements",
            get(measurements::list_by_chart).post(measurements::create),
        )
}

fn measurement_routes() -> Router<AppState> {
    Router::new().route(
        "/api/measurements/:id",
        get(measurements::get)
            .patch(measurements::update)
            .delete(measurements::delete),
    )
}

fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboards", get(dashboards::list).post(dashboards::create))
        .route(
            "/api/dashboards/:id",
            get(dashboards::get).patch(dashboards::update).delete(dashboards::delete),
        )
        // Public share link
        .route("/api/share/:share_id", get(dashboards::shared))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub(crate) fn created(id: Uuid) -> ApiResult<Value> {
    Ok(ApiResponse::created(json!({ "id": id })))
}

pub(crate) fn updated(entity: EntityKind, id: Uuid, affected: Affected) -> ApiResult<Value> {
    let rows = affected.or_not_found(entity, id)?;
    Ok(ApiResponse::success(json!({ "id": id, "updated": rows })))
}

pub(crate) fn deleted(entity: EntityKind, id: Uuid, affected: Affected) -> ApiResult<Value> {
    let rows = affected.or_not_found(entity, id)?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": rows })))
}
