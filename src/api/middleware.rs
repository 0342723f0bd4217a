//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope and its mapping from service errors
//! - Session authentication (`Authorization: Bearer` or `session` cookie)
//! - Admin authorization

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxActivityRepository, SqlxBookRepository, SqlxChapterRepository, SqlxEventRepository,
    SqlxInquiryRepository, SqlxPasswordResetRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::Account;
use crate::services::{
    ActivityService, ActivityServiceError, BookService, BookServiceError, CatalogService,
    CatalogServiceError, ChapterService, ChapterServiceError, DashboardService, EventService,
    EventServiceError, InquiryService, InquiryServiceError, Mailer, StorageError, StorageService,
    UserService, UserServiceError,
};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub book_service: Arc<BookService>,
    pub catalog_service: Arc<CatalogService>,
    pub chapter_service: Arc<ChapterService>,
    pub activity_service: Arc<ActivityService>,
    pub event_service: Arc<EventService>,
    pub inquiry_service: Arc<InquiryService>,
    pub dashboard_service: Arc<DashboardService>,
    pub storage: Arc<StorageService>,
    /// Session lifetime, mirrored into the cookie's Max-Age
    pub session_days: i64,
}

impl AppState {
    /// Wire every service over `pool`
    pub fn new(pool: DynDatabasePool, config: &Config, mailer: Arc<dyn Mailer>) -> Self {
        let users = SqlxUserRepository::boxed(pool.clone());
        let books = SqlxBookRepository::boxed(pool.clone());
        let chapters = SqlxChapterRepository::boxed(pool.clone());
        let activities = SqlxActivityRepository::boxed(pool.clone());
        let events = SqlxEventRepository::boxed(pool.clone());
        let inquiries = SqlxInquiryRepository::boxed(pool.clone());

        let user_service = UserService::new(
            users.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            mailer,
        )
        .with_session_days(config.auth.session_days)
        .with_reset_minutes(config.auth.reset_token_minutes)
        .with_public_url(config.server.public_url.clone());

        Self {
            user_service: Arc::new(user_service),
            book_service: Arc::new(BookService::new(books.clone())),
            catalog_service: Arc::new(CatalogService::new(books.clone(), chapters.clone())),
            chapter_service: Arc::new(ChapterService::new(chapters.clone(), books.clone())),
            activity_service: Arc::new(ActivityService::new(
                activities.clone(),
                books.clone(),
                chapters.clone(),
            )),
            event_service: Arc::new(EventService::new(events.clone())),
            inquiry_service: Arc::new(InquiryService::new(inquiries.clone())),
            dashboard_service: Arc::new(DashboardService::new(
                users, books, chapters, activities, events, inquiries,
            )),
            storage: Arc::new(StorageService::new(
                config.storage.path.clone(),
                config.storage.max_file_size,
            )),
            session_days: config.auth.session_days,
            pool,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the cause and answer with a generic message
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", cause);
        Self::new("INTERNAL_ERROR", "Something went wrong. Please try again.")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal_error(err)
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound(msg) => ApiError::not_found(msg),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<BookServiceError> for ApiError {
    fn from(err: BookServiceError) -> Self {
        match err {
            BookServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            BookServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            BookServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<CatalogServiceError> for ApiError {
    fn from(err: CatalogServiceError) -> Self {
        match err {
            CatalogServiceError::NotFound(msg) => ApiError::not_found(format!("{} not found", msg)),
            CatalogServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<ChapterServiceError> for ApiError {
    fn from(err: ChapterServiceError) -> Self {
        match err {
            ChapterServiceError::NotFound(msg) => ApiError::not_found(format!("{} not found", msg)),
            ChapterServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ChapterServiceError::Conflict(msg) => ApiError::conflict(msg),
            ChapterServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<ActivityServiceError> for ApiError {
    fn from(err: ActivityServiceError) -> Self {
        match err {
            ActivityServiceError::NotFound(msg) => ApiError::not_found(format!("{} not found", msg)),
            ActivityServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ActivityServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<EventServiceError> for ApiError {
    fn from(err: EventServiceError) -> Self {
        match err {
            EventServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            EventServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            EventServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<InquiryServiceError> for ApiError {
    fn from(err: InquiryServiceError) -> Self {
        match err {
            InquiryServiceError::NotFound(msg) => ApiError::not_found(format!("{} not found", msg)),
            InquiryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            InquiryServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ValidationError(msg) => ApiError::validation_error(msg),
            StorageError::NotFound(_) => ApiError::not_found(err.to_string()),
            StorageError::TooLarge(limit) => ApiError::with_details(
                "PAYLOAD_TOO_LARGE",
                err.to_string(),
                serde_json::json!({ "max_bytes": limit }),
            ),
            StorageError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// The signed-in account, resolved once per request by [`require_auth`]
/// or [`optional_auth`] and handed to handlers read-only.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account: Account,
    pub session_id: String,
}

impl AuthContext {
    pub fn user_id(&self) -> i64 {
        self.account.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.account.is_admin()
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> OptionalFromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthContext>().cloned())
    }
}

/// Session token from the Authorization header or the session cookie
pub fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(token) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    request
        .headers()
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())?
        .split(';')
        .filter_map(|c| c.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

async fn resolve(state: &AppState, token: String) -> Result<Option<AuthContext>, ApiError> {
    let account = state.user_service.validate_session(&token).await?;
    Ok(account.map(|account| AuthContext {
        account,
        session_id: token,
    }))
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let auth = resolve(&state, token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// Attach the account when a valid session is present, never reject
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(&request) {
        match resolve(&state, token).await {
            Ok(Some(auth)) => {
                request.extensions_mut().insert(auth);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring session lookup failure: {}", e.error.message),
        }
    }
    next.run(request).await
}

/// Admin authorization middleware; runs after [`require_auth`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth = request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !auth.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(name: header::HeaderName, value: &str) -> Request {
        Request::builder()
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_token_from_bearer_header() {
        let request = request_with(header::AUTHORIZATION, "Bearer abc-123");
        assert_eq!(extract_session_token(&request).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_token_from_cookie() {
        let request = request_with(header::COOKIE, "theme=dark; session=tok; other=1");
        assert_eq!(extract_session_token(&request).as_deref(), Some("tok"));

        let empty = request_with(header::COOKIE, "session=");
        assert!(extract_session_token(&empty).is_none());

        let prefixed = request_with(header::COOKIE, "old_session=nope");
        assert!(extract_session_token(&prefixed).is_none());
    }

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (ApiError::validation_error("x"), StatusCode::BAD_REQUEST),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (StorageError::TooLarge(10).into(), StatusCode::PAYLOAD_TOO_LARGE),
            (ApiError::internal_error("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_internal_errors_hide_cause() {
        let error: ApiError = anyhow::anyhow!("secret table name").into();
        assert!(!error.error.message.contains("secret"));
    }
}
