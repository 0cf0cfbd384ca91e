//! Gallery routes
//!
//! `GET /:homework_id` renders every photo uploaded for that id, newest first.

use axum::{
    extract::{Path, State},
    response::Html,
    routing::get,
    Router,
};
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::html::render_gallery;
use crate::state::AppState;
use crate::upload::HomeworkId;

/// Create the gallery router
pub fn router() -> Router<AppState> {
    Router::new().route("/:homework_id", get(show_gallery))
}

async fn show_gallery(
    State(state): State<AppState>,
    Path(homework_id): Path<String>,
) -> Result<Html<String>> {
    // Only ids the upload protocol would accept have a gallery
    let homework_id: HomeworkId = homework_id
        .parse()
        .map_err(|_| AppError::NotFound(format!("No gallery at /{}", homework_id)))?;

    let photos = state.photo_store().list(&homework_id).await?;
    tracing::debug!(homework_id = %homework_id, count = photos.len(), "Rendering gallery");

    Ok(Html(render_gallery(
        &homework_id,
        &photos,
        state.config().gallery.utc_offset,
        Utc::now(),
    )))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::routes::app;
    use crate::state::AppState;
    use crate::storage::PhotoStore;

    async fn get(state: AppState, uri: &str) -> (StatusCode, String) {
        let response = app(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_gallery_lists_uploads_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());
        let id = "123456789".parse().unwrap();
        let first = store.store(&id, b"BM first").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.store(&id, b"BM second").await.unwrap();

        let (status, body) = get(AppState::new(Config::default(), store), "/123456789").await;

        assert_eq!(status, StatusCode::OK);
        let newer = body.find(&second.url()).unwrap();
        let older = body.find(&first.url()).unwrap();
        assert!(newer < older);
    }

    #[tokio::test]
    async fn test_gallery_shows_times_at_configured_offset() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("123456789");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("2023-11-03T22:52:29.378815+00:00.bmp"), b"BM").unwrap();

        let mut config = Config::default();
        config.gallery.utc_offset = Some("-06:00".parse().unwrap());
        let state = AppState::new(config, PhotoStore::new(temp_dir.path()));

        let (status, body) = get(state, "/123456789").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(">Nov 3, 2023 4:52 PM</time>"));
    }

    #[tokio::test]
    async fn test_gallery_for_unknown_id_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let state = AppState::new(Config::default(), PhotoStore::new(temp_dir.path()));

        let (status, body) = get(state, "/ABCDEF123").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No photos have been uploaded yet."));
        assert!(!temp_dir.path().join("ABCDEF123").exists());
    }

    #[tokio::test]
    async fn test_gallery_rejects_malformed_ids() {
        let temp_dir = TempDir::new().unwrap();
        let state = AppState::new(Config::default(), PhotoStore::new(temp_dir.path()));

        for uri in ["/zzzzzzzzz", "/abcdef123", "/12345678", "/1234567890"] {
            let (status, _) = get(state.clone(), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_health() {
        let temp_dir = TempDir::new().unwrap();
        let state = AppState::new(Config::default(), PhotoStore::new(temp_dir.path()));

        let (status, body) = get(state, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["image_port"], 2240);
    }
}
