//! Chapter administration endpoints (admin only)
//!
//! - GET    /api/v1/admin/books/{book_id}/chapters
//! - POST   /api/v1/admin/books/{book_id}/chapters - Append a chapter
//! - POST   /api/v1/admin/books/{book_id}/chapters/repair - Renumber densely
//! - GET    /api/v1/admin/chapters/{id}
//! - PUT    /api/v1/admin/chapters/{id}
//! - DELETE /api/v1/admin/chapters/{id}
//! - POST   /api/v1/admin/chapters/{id}/move - Body `{"direction": "up" | "down"}`
//! - GET    /api/v1/admin/chapters/{id}/navigation - Neighbours and position

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{ChapterInput, ChapterNavigation, ChapterView, MoveDirection};

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub direction: MoveDirection,
}

/// Routes nested under `/admin/books`
pub fn book_router() -> Router<AppState> {
    Router::new()
        .route("/{id}/chapters", get(list_chapters).post(create_chapter))
        .route("/{id}/chapters/repair", post(repair_order))
}

/// Routes nested under `/admin/chapters`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_chapter).put(update_chapter).delete(delete_chapter))
        .route("/{id}/move", post(move_chapter))
        .route("/{id}/navigation", get(chapter_navigation))
}

async fn list_chapters(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> Result<Json<Vec<ChapterView>>, ApiError> {
    Ok(Json(state.chapter_service.list(book_id).await?))
}

async fn create_chapter(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
    Json(body): Json<ChapterInput>,
) -> Result<(StatusCode, Json<ChapterView>), ApiError> {
    let chapter = state.chapter_service.create(book_id, body).await?;
    Ok((StatusCode::CREATED, Json(chapter)))
}

async fn repair_order(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> Result<Json<Vec<ChapterView>>, ApiError> {
    Ok(Json(state.chapter_service.repair_order(book_id).await?))
}

async fn get_chapter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ChapterView>, ApiError> {
    Ok(Json(state.chapter_service.get(id).await?))
}

async fn update_chapter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ChapterInput>,
) -> Result<Json<ChapterView>, ApiError> {
    Ok(Json(state.chapter_service.update(id, body).await?))
}

async fn delete_chapter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.chapter_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the book's chapters in their new order
async fn move_chapter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<MoveRequest>,
) -> Result<Json<Vec<ChapterView>>, ApiError> {
    Ok(Json(state.chapter_service.move_chapter(id, body.direction).await?))
}

async fn chapter_navigation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ChapterNavigation>, ApiError> {
    Ok(Json(state.chapter_service.navigation(id).await?))
}
