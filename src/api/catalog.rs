//! Reader catalog endpoints (signed in)
//!
//! - GET /api/v1/books?search= - Books for the reader's age group
//! - GET /api/v1/books/{id}
//! - GET /api/v1/books/{id}/chapters
//! - GET /api/v1/chapters/{id} - Chapter with previous/next links

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthContext};
use crate::models::{BookListing, ChapterView};
use crate::services::ChapterReading;

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub search: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books))
        .route("/books/{id}", get(get_book))
        .route("/books/{id}/chapters", get(list_chapters))
        .route("/chapters/{id}", get(read_chapter))
}

async fn list_books(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<BookListing>>, ApiError> {
    let books = state
        .catalog_service
        .visible_books(&auth.account.profile, query.search.as_deref())
        .await?;
    Ok(Json(books))
}

async fn get_book(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<BookListing>, ApiError> {
    Ok(Json(state.catalog_service.open_book(&auth.account.profile, id).await?))
}

async fn list_chapters(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ChapterView>>, ApiError> {
    Ok(Json(
        state
            .catalog_service
            .book_chapters(&auth.account.profile, id)
            .await?,
    ))
}

async fn read_chapter(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ChapterReading>, ApiError> {
    Ok(Json(
        state
            .catalog_service
            .read_chapter(&auth.account.profile, id)
            .await?,
    ))
}
