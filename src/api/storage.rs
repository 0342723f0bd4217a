//! Storage bucket endpoints
//!
//! - POST   /api/v1/storage/{bucket} - Multipart upload, field `file` (signed in)
//! - GET    /api/v1/storage/{bucket}/{name} - Download; private buckets need a session
//! - GET    /api/v1/admin/storage/{bucket} - First 100 files by name
//! - DELETE /api/v1/admin/storage/{bucket}/{name}
//!
//! Readers may only upload to `activity_files`; staff may upload anywhere.
//! Files from reader-writable buckets are always served as attachments.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthContext};
use crate::services::{Bucket, StoredFile, StoredObject};

/// Multipart framing allowance on top of the file size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Upload routes (signed in)
pub fn upload_router(max_file_size: u64) -> Router<AppState> {
    let limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/{bucket}", post(upload))
        .layer(DefaultBodyLimit::max(limit))
}

/// Download route; runs behind optional authentication
pub fn download_router() -> Router<AppState> {
    Router::new().route("/{bucket}/{name}", get(download))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/{bucket}", get(list_files))
        .route("/{bucket}/{name}", delete(remove_file))
}

fn parse_bucket(bucket: &str) -> Result<Bucket, ApiError> {
    bucket.parse().map_err(ApiError::not_found)
}

async fn upload(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(bucket): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>), ApiError> {
    let bucket = parse_bucket(&bucket)?;
    if !auth.is_admin() && !bucket.accepts_reader_uploads() {
        return Err(ApiError::forbidden(format!("Uploads to {} are staff only", bucket)));
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        let stored = state
            .storage
            .upload(bucket, &filename, &content_type, &data)
            .await?;
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(ApiError::validation_error("No file provided"))
}

async fn download(
    State(state): State<AppState>,
    auth: Option<AuthContext>,
    Path((bucket, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let bucket = parse_bucket(&bucket)?;
    if !bucket.is_public() && auth.is_none() {
        return Err(ApiError::unauthorized("Sign in to open this file"));
    }

    let (data, content_type) = state.storage.read(bucket, &name).await?;
    Ok((download_headers(bucket, &name, content_type)?, data))
}

fn download_headers(
    bucket: Bucket,
    name: &str,
    content_type: &'static str,
) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    if bucket.accepts_reader_uploads() {
        let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
            .map_err(|e| ApiError::validation_error(format!("Invalid file name: {}", e)))?;
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(headers)
}

async fn list_files(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<Json<Vec<StoredObject>>, ApiError> {
    let bucket = parse_bucket(&bucket)?;
    Ok(Json(state.storage.list(bucket).await?))
}

async fn remove_file(
    State(state): State<AppState>,
    Path((bucket, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let bucket = parse_bucket(&bucket)?;
    state.storage.remove(bucket, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
