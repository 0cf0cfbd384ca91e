//! Photo file serving routes
//!
//! Serves the storage root under `/photos`, e.g.
//! `/photos/123456789/2024-03-01T17:04:05.123456+00:00.bmp`.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the photos router
pub fn router() -> Router<AppState> {
    Router::new().route("/*path", get(serve_photo))
}

/// Serve a stored file
async fn serve_photo(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response> {
    let file_path = state
        .photo_store()
        .resolve(&path)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid photo path: {}", path)))?;

    let metadata = tokio::fs::metadata(&file_path).await?;
    if !metadata.is_file() {
        return Err(AppError::NotFound(format!("Photo not found: {}", path)));
    }

    let bytes = tokio::fs::read(&file_path).await?;
    let filename = path.rsplit('/').next().unwrap_or(&path);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, guess_content_type(&path))
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", filename.replace('"', "")),
        )
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Guess content type from file extension
fn guess_content_type(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext.to_lowercase().as_str() {
        "bmp" => "image/bmp",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
