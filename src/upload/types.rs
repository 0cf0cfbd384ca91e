//! Upload types for the raw TCP photo protocol

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::storage::StorageError;

// ============================================================================
// Constants
// ============================================================================

/// Length of the identifier frame that opens every connection
pub const HOMEWORK_ID_LENGTH: usize = 9;

/// Size of the fixed-format BMP the lab camera produces
pub const IMAGE_SIZE: usize = 49206;

/// Every accepted payload starts with these bytes
pub const BMP_MAGIC: &[u8; 2] = b"BM";

/// Upper bound on untrusted input echoed back to clients or logs
pub const PREVIEW_LIMIT: usize = 50;

pub const SUCCESS_RESPONSE: &str = "SUCCESS";

// ============================================================================
// Homework ID
// ============================================================================

/// A validated homework identifier: exactly nine characters of `[A-F0-9]`.
///
/// The only ways to obtain one are [`HomeworkId::parse`] and [`FromStr`], so a
/// value of this type is always safe to use as a directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HomeworkId(String);

impl HomeworkId {
    /// Validate a raw identifier frame read off the wire
    pub fn parse(raw: &[u8]) -> Result<Self, UploadError> {
        let text = std::str::from_utf8(raw).map_err(|_| UploadError::UndecodableId {
            preview: preview(raw),
        })?;

        if !Self::is_valid(text) {
            return Err(UploadError::InvalidId {
                preview: preview(raw),
            });
        }

        Ok(Self(text.to_string()))
    }

    pub fn is_valid(candidate: &str) -> bool {
        candidate.len() == HOMEWORK_ID_LENGTH
            && candidate
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for HomeworkId {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

impl fmt::Display for HomeworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ASCII-escaped rendering of at most [`PREVIEW_LIMIT`] bytes of untrusted input
pub fn preview(raw: &[u8]) -> String {
    raw[..raw.len().min(PREVIEW_LIMIT)].escape_ascii().to_string()
}

// ============================================================================
// Session Policy & Stages
// ============================================================================

/// Immutable per-session behaviour, derived once from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub delay: Duration,
    pub read_timeout: Option<Duration>,
    pub image_size: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            read_timeout: None,
            image_size: IMAGE_SIZE,
        }
    }
}

/// Where a session is in the upload protocol. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStage {
    AwaitingId,
    ArtificialDelay,
    AwaitingPayload,
    Validating,
    Persisting,
    Done,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStage::AwaitingId => "awaiting_id",
            SessionStage::ArtificialDelay => "artificial_delay",
            SessionStage::AwaitingPayload => "awaiting_payload",
            SessionStage::Validating => "validating",
            SessionStage::Persisting => "persisting",
            SessionStage::Done => "done",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Everything that can end an upload session early
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("timed out after {after:?} while {stage}")]
    Timeout { stage: SessionStage, after: Duration },

    #[error("connection ended while {stage}: {source}")]
    Incomplete {
        stage: SessionStage,
        #[source]
        source: std::io::Error,
    },

    #[error("homework ID is not valid UTF-8: {preview}")]
    UndecodableId { preview: String },

    #[error("homework ID does not match [A-F0-9]{{9}}: {preview}")]
    InvalidId { preview: String },

    #[error("payload does not start with BM")]
    BadMagic,

    #[error("failed to store image: {0}")]
    Storage(#[from] StorageError),
}

impl UploadError {
    /// The single line sent back to the client before closing
    pub fn response(&self) -> String {
        match self {
            UploadError::Timeout { .. } | UploadError::Incomplete { .. } => {
                "ERROR: Did not receive enough data".to_string()
            }
            UploadError::UndecodableId { preview } | UploadError::InvalidId { preview } => {
                format!("ERROR: Invalid homework ID {}", preview)
            }
            UploadError::BadMagic => "ERROR: BMP file does not start with BM".to_string(),
            UploadError::Storage(_) => "ERROR: Could not save image".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
