//! Event endpoints
//!
//! - GET /api/v1/events - Visible events, soonest first (signed in)
//! - GET|POST /api/v1/admin/events
//! - GET|PUT|DELETE /api/v1/admin/events/{id}
//! - PUT /api/v1/admin/events/{id}/visibility

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Event, EventInput};

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_visible))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_event))
        .route("/{id}", get(get_event).put(update_event).delete(delete_event))
        .route("/{id}/visibility", put(set_visibility))
}

async fn list_visible(State(state): State<AppState>) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.event_service.list_visible().await?))
}

async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.event_service.list_all().await?))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.event_service.get(id).await?))
}

async fn create_event(
    State(state): State<AppState>,
    Json(body): Json<EventInput>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let event = state.event_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<EventInput>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.event_service.update(id, body).await?))
}

async fn set_visibility(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<VisibilityRequest>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.event_service.set_visibility(id, body.visible).await?))
}

async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.event_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
