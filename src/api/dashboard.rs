//! Dashboard endpoints
//!
//! - GET /api/v1/dashboard - Reader counts (signed in)
//! - GET /api/v1/admin/dashboard - Staff counts

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthContext};
use crate::services::{AdminStats, ReaderStats};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(reader_stats))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/", get(admin_stats))
}

async fn reader_stats(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ReaderStats>, ApiError> {
    Ok(Json(
        state
            .dashboard_service
            .reader_stats(&auth.account.profile)
            .await?,
    ))
}

async fn admin_stats(State(state): State<AppState>) -> Result<Json<AdminStats>, ApiError> {
    Ok(Json(state.dashboard_service.admin_stats().await?))
}
