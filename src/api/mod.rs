//! Thin admin HTTP surface (§6): CRUD over destinations and read-only delivery
//! status. Handlers validate and delegate; all orchestration lives in
//! `provisioning::service`/`provisioning::scheduler`.

use crate::domain::{CreateDestinationInput, Delivery, Destination, DestinationWithSecret, StringUuid, UpdateDestinationInput};
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::sync::Arc;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/destinations", post(create_destination))
        .route(
            "/destinations/:id",
            get(get_destination).put(update_destination).delete(delete_destination),
        )
        .route("/destinations/:id/deliveries", get(list_deliveries))
        .with_state(state)
}

/// Standalone sub-router so `/metrics` can carry its own (narrower) state
/// without widening `AppState` with something the rest of the admin surface
/// never needs.
pub fn metrics_router(prometheus_handle: Arc<Option<PrometheusHandle>>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle)
}

async fn metrics_handler(State(handle): State<Arc<Option<PrometheusHandle>>>) -> impl IntoResponse {
    match handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (StatusCode::NOT_FOUND, "metrics not enabled".to_string()),
    }
}

async fn create_destination(
    State(state): State<AppState>,
    Json(input): Json<CreateDestinationInput>,
) -> Result<Json<DestinationWithSecret>> {
    let created = state.destination_service.create(input).await?;
    Ok(Json(created))
}

async fn get_destination(State(state): State<AppState>, Path(id): Path<StringUuid>) -> Result<Json<Destination>> {
    let destination = state
        .destinations
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("destination {id} not found")))?;
    Ok(Json(destination))
}

async fn update_destination(
    State(state): State<AppState>,
    Path(id): Path<StringUuid>,
    Json(input): Json<UpdateDestinationInput>,
) -> Result<Json<Destination>> {
    let updated = state.destination_service.update(id, input).await?;
    Ok(Json(updated))
}

async fn delete_destination(State(state): State<AppState>, Path(id): Path<StringUuid>) -> Result<()> {
    state.destination_service.delete(id).await
}

#[derive(Debug, Deserialize)]
struct ListDeliveriesQuery {
    #[serde(default)]
    page: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

fn default_page_size() -> u32 {
    50
}

async fn list_deliveries(
    State(state): State<AppState>,
    Path(id): Path<StringUuid>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<Json<Vec<Delivery>>> {
    let deliveries = state
        .deliveries
        .list_by_destination(id, query.page, query.page_size)
        .await?;
    Ok(Json(deliveries))
}
