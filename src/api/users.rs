//! User administration endpoints (admin only)
//!
//! - GET /api/v1/admin/users - Accounts with profiles, newest first
//! - PUT /api/v1/admin/users/{id}/role

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthContext};
use crate::models::{Account, UserRole};

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}/role", put(set_role))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<Account>>, ApiError> {
    Ok(Json(state.user_service.list_accounts().await?))
}

async fn set_role(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(
        state
            .user_service
            .set_role(&auth.account, id, body.role)
            .await?,
    ))
}
