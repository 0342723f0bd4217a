//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1` and speak JSON, apart from file
//! uploads (multipart) and downloads (raw bytes). Routes are grouped by
//! the access they need:
//! - public: health, register, login, password reset
//! - signed in: catalog, activities, events, inquiries, dashboard, uploads
//! - admin: everything under `/admin`

pub mod activities;
pub mod auth;
pub mod books;
pub mod catalog;
pub mod chapters;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod inquiries;
pub mod middleware;
pub mod storage;
pub mod users;

#[cfg(test)]
mod tests;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthContext};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin/books", books::admin_router().merge(chapters::book_router()))
        .nest("/admin/chapters", chapters::admin_router())
        .nest("/admin/activities", activities::admin_router())
        .nest("/admin/events", events::admin_router())
        .nest("/admin/inquiries", inquiries::admin_router())
        .nest("/admin/users", users::admin_router())
        .nest("/admin/dashboard", dashboard::admin_router())
        .nest("/admin/storage", storage::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(catalog::router())
        .nest("/activities", activities::router())
        .nest("/events", events::router())
        .nest("/inquiries", inquiries::router())
        .nest("/dashboard", dashboard::router())
        .nest("/storage", storage::upload_router(state.storage.max_file_size()))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Downloads decide per bucket whether a session is needed
    let download_routes = Router::new()
        .nest("/storage", storage::download_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .nest("/health", health::router())
        .nest("/auth", auth::public_router())
        .merge(download_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    // Credentials are allowed so the session cookie works cross-origin
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
