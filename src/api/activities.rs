//! Activity endpoints
//!
//! Signed in:
//! - POST /api/v1/activities - Submit an activity
//! - GET  /api/v1/activities/mine
//! - GET  /api/v1/activities/published
//!
//! Admin:
//! - GET    /api/v1/admin/activities - Every activity with context
//! - POST   /api/v1/admin/activities - Publish a worksheet
//! - PUT    /api/v1/admin/activities/{id} - Edit a published worksheet
//! - PUT    /api/v1/admin/activities/{id}/status
//! - DELETE /api/v1/admin/activities/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthContext};
use crate::models::{
    Activity, ActivityStatus, ActivityWithMeta, PublishActivityInput, SubmitActivityInput,
};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ActivityStatus,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_activity))
        .route("/mine", get(list_mine))
        .route("/published", get(list_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(publish_activity))
        .route("/{id}", put(update_published).delete(delete_activity))
        .route("/{id}/status", put(set_status))
}

async fn submit_activity(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<SubmitActivityInput>,
) -> Result<(StatusCode, Json<Activity>), ApiError> {
    let activity = state.activity_service.submit(auth.user_id(), body).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn list_mine(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Activity>>, ApiError> {
    Ok(Json(state.activity_service.list_mine(auth.user_id()).await?))
}

async fn list_published(State(state): State<AppState>) -> Result<Json<Vec<Activity>>, ApiError> {
    Ok(Json(state.activity_service.list_published().await?))
}

async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<ActivityWithMeta>>, ApiError> {
    Ok(Json(state.activity_service.list_all().await?))
}

async fn publish_activity(
    State(state): State<AppState>,
    Json(body): Json<PublishActivityInput>,
) -> Result<(StatusCode, Json<Activity>), ApiError> {
    let activity = state.activity_service.publish(body).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn update_published(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<PublishActivityInput>,
) -> Result<Json<Activity>, ApiError> {
    Ok(Json(state.activity_service.update_published(id, body).await?))
}

async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Activity>, ApiError> {
    Ok(Json(state.activity_service.set_status(id, body.status).await?))
}

async fn delete_activity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.activity_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
