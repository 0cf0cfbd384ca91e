//! Photo Store
//!
//! Local filesystem storage for uploaded BMP files.
//!
//! Writes never overwrite: the payload goes to a hidden temp file in the
//! target directory and is then hard-linked to its final name, which fails if
//! that name is taken. Readers never see a partially written `.bmp`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::upload::HomeworkId;

use super::types::{parse_photo_file_name, photo_file_name, StorageError, StoredPhoto, PHOTO_EXTENSION};

/// Handle to the photo storage root. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: Arc<PathBuf>,
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every upload for one homework id
    pub fn homework_dir(&self, homework_id: &HomeworkId) -> PathBuf {
        self.root.join(homework_id.as_str())
    }

    /// Persist a validated payload as `<root>/<id>/<timestamp>.bmp`
    pub async fn store(
        &self,
        homework_id: &HomeworkId,
        payload: &[u8],
    ) -> Result<StoredPhoto, StorageError> {
        self.store_at(homework_id, payload, Utc::now()).await
    }

    async fn store_at(
        &self,
        homework_id: &HomeworkId,
        payload: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<StoredPhoto, StorageError> {
        let dir = self.homework_dir(homework_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        let file_name = photo_file_name(captured_at);
        let path = dir.join(&file_name);
        let tmp_path = dir.join(format!(".{}.part", Uuid::new_v4()));

        tracing::debug!(
            homework_id = %homework_id,
            path = %path.display(),
            size = payload.len(),
            "Writing photo"
        );

        if let Err(e) = tokio::fs::write(&tmp_path, payload).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StorageError::io(&tmp_path, e));
        }

        let published = tokio::fs::hard_link(&tmp_path, &path).await;
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            tracing::warn!(path = %tmp_path.display(), error = %e, "Failed to remove temp file");
        }

        match published {
            Ok(()) => Ok(StoredPhoto {
                homework_id: homework_id.clone(),
                file_name,
                path,
                captured_at: captured_at.fixed_offset(),
            }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StorageError::Collision { path }),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    /// Every stored photo for `homework_id`, most recent first.
    ///
    /// A homework id that has never uploaded simply has no photos.
    pub async fn list(&self, homework_id: &HomeworkId) -> Result<Vec<StoredPhoto>, StorageError> {
        let dir = self.homework_dir(homework_id);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&dir, e)),
        };

        let mut photos = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&dir, e))?
        {
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            if !file_name.ends_with(PHOTO_EXTENSION) {
                continue;
            }

            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }

            match parse_photo_file_name(&file_name) {
                Some(captured_at) => photos.push(StoredPhoto {
                    homework_id: homework_id.clone(),
                    path: entry.path(),
                    file_name,
                    captured_at,
                }),
                None => {
                    tracing::debug!(file = %file_name, "Skipping file without a timestamp name");
                }
            }
        }

        // Names may carry different offsets, so order by instant rather than text
        photos.sort_by(|a, b| {
            b.captured_at
                .cmp(&a.captured_at)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(photos)
    }

    /// Map a request path below the storage root to a file path.
    ///
    /// Returns `None` for anything that could escape the root: absolute
    /// paths, `..`, or empty paths.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let mut resolved = self.root.to_path_buf();
        let mut depth = 0;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }

        (depth > 0).then_some(resolved)
    }
}

// ============================================================================
// Tests
// ============================================================================
