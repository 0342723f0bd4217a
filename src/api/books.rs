//! Book administration endpoints (admin only)
//!
//! - GET    /api/v1/admin/books
//! - POST   /api/v1/admin/books
//! - GET    /api/v1/admin/books/{id}
//! - PUT    /api/v1/admin/books/{id}
//! - DELETE /api/v1/admin/books/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Book, BookInput};

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
}

async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<Book>>, ApiError> {
    Ok(Json(state.book_service.list().await?))
}

async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, ApiError> {
    Ok(Json(state.book_service.get(id).await?))
}

async fn create_book(
    State(state): State<AppState>,
    Json(body): Json<BookInput>,
) -> Result<(StatusCode, Json<Book>), ApiError> {
    let book = state.book_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<BookInput>,
) -> Result<Json<Book>, ApiError> {
    Ok(Json(state.book_service.update(id, body).await?))
}

async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.book_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
