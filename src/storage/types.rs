//! Storage types

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use thiserror::Error;

use crate::upload::HomeworkId;

/// Extension of every stored upload
pub const PHOTO_EXTENSION: &str = "bmp";

/// URL prefix the web server mounts the storage root under
pub const PHOTOS_URL_PREFIX: &str = "/photos";

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a photo already exists at {}", path.display())]
    Collision { path: PathBuf },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A persisted upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    pub homework_id: HomeworkId,
    /// `<timestamp>.bmp`
    pub file_name: String,
    pub path: PathBuf,
    pub captured_at: DateTime<FixedOffset>,
}

impl StoredPhoto {
    /// Browser-facing URL, percent-encoded
    pub fn url(&self) -> String {
        format!(
            "{}/{}/{}",
            PHOTOS_URL_PREFIX,
            self.homework_id,
            urlencoding::encode(&self.file_name)
        )
    }
}

/// File name for an upload completed at `at`.
///
/// RFC 3339 in UTC with microseconds and an explicit offset, e.g.
/// `2024-03-01T17:04:05.123456+00:00.bmp`. Fixed width, so lexical order is
/// chronological order.
pub fn photo_file_name(at: DateTime<Utc>) -> String {
    format!(
        "{}.{}",
        at.to_rfc3339_opts(SecondsFormat::Micros, false),
        PHOTO_EXTENSION
    )
}

/// Recover the capture instant from a stored file name
pub fn parse_photo_file_name(file_name: &str) -> Option<DateTime<FixedOffset>> {
    let stem = file_name.strip_suffix(PHOTO_EXTENSION)?.strip_suffix('.')?;
    DateTime::parse_from_rfc3339(stem).ok()
}
