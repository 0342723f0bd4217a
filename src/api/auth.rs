//! Authentication API endpoints
//!
//! Public:
//! - POST /api/v1/auth/register - Create an account and sign in
//! - POST /api/v1/auth/login - Sign in
//! - POST /api/v1/auth/password-reset - Mail a reset link
//! - POST /api/v1/auth/password-reset/confirm - Set a new password with a reset token
//!
//! Signed in:
//! - POST /api/v1/auth/logout
//! - GET /api/v1/auth/me
//! - PUT /api/v1/auth/profile
//! - PUT /api/v1/auth/password

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthContext, SESSION_COOKIE};
use crate::models::{Account, Profile, ProfileInput};
use crate::services::user::{ChangePasswordInput, LoginInput, RegisterInput, ResetConfirmInput};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub account: Account,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Plain acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/password-reset", post(request_password_reset))
        .route("/password-reset/confirm", post(confirm_password_reset))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

fn session_cookie(token: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    HeaderValue::from_str(&cookie).map_err(ApiError::internal_error)
}

async fn open_session(
    state: &AppState,
    input: LoginInput,
) -> Result<(HeaderMap, AuthResponse), ApiError> {
    let (session, account) = state.user_service.login(input).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&session.id, state.session_days * 24 * 60 * 60)?,
    );
    Ok((
        headers,
        AuthResponse {
            account,
            token: session.id,
        },
    ))
}

/// POST /api/v1/auth/register
///
/// The first account becomes an admin. Signs the new user in.
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let login = LoginInput {
        email: body.email.clone(),
        password: body.password.clone(),
    };
    state.user_service.register(body).await?;

    let (headers, response) = open_session(&state, login).await?;
    Ok((StatusCode::CREATED, headers, Json(response)))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (headers, response) = open_session(&state, body).await?;
    Ok((headers, Json(response)))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.logout(&auth.session_id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie("", 0)?);
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/v1/auth/me
async fn me(auth: AuthContext) -> Json<Account> {
    Json(auth.account)
}

/// PUT /api/v1/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<ProfileInput>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state.user_service.update_profile(auth.user_id(), body).await?;
    Ok(Json(profile))
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<ChangePasswordInput>,
) -> Result<StatusCode, ApiError> {
    state.user_service.change_password(auth.user_id(), body).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/auth/password-reset
///
/// Answers the same way whether or not the email is registered.
async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.request_password_reset(&body.email).await?;
    Ok(Json(MessageResponse {
        message: "If that email is registered, a reset link is on its way".to_string(),
    }))
}

/// POST /api/v1/auth/password-reset/confirm
async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetConfirmInput>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.confirm_password_reset(body).await?;
    Ok(Json(MessageResponse {
        message: "Password updated. Please sign in again".to_string(),
    }))
}
