//! Feedback and question endpoints
//!
//! `{kind}` is `feedback` or `questions`.
//!
//! - GET|POST /api/v1/inquiries/{kind} - Own posts / new post (signed in)
//! - GET /api/v1/admin/inquiries/{kind} - Staff inbox
//! - PUT /api/v1/admin/inquiries/{kind}/{id}/response

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthContext};
use crate::models::{Inquiry, InquiryKind, InquiryWithNames};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub response: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{kind}", get(list_mine).post(submit))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/{kind}", get(list_all))
        .route("/{kind}/{id}/response", put(respond))
}

fn parse_kind(kind: &str) -> Result<InquiryKind, ApiError> {
    kind.parse().map_err(ApiError::not_found)
}

async fn list_mine(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(kind): Path<String>,
) -> Result<Json<Vec<Inquiry>>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.inquiry_service.list_mine(kind, auth.user_id()).await?))
}

async fn submit(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(kind): Path<String>,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Inquiry>), ApiError> {
    let kind = parse_kind(&kind)?;
    let inquiry = state
        .inquiry_service
        .submit(kind, auth.user_id(), &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(inquiry)))
}

async fn list_all(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<InquiryWithNames>>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.inquiry_service.list_all(kind).await?))
}

async fn respond(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((kind, id)): Path<(String, i64)>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<Inquiry>, ApiError> {
    let kind = parse_kind(&kind)?;
    let inquiry = state
        .inquiry_service
        .respond(kind, id, auth.user_id(), &body.response)
        .await?;
    Ok(Json(inquiry))
}
