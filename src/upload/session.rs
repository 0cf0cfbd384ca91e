//! Upload Session
//!
//! One session per accepted connection. The session walks the protocol
//! stages strictly in order:
//!
//! 1. read the 9-byte homework id and validate it
//! 2. optionally sleep, simulating a slow server
//! 3. read the fixed-size payload
//! 4. check the `BM` magic
//! 5. persist the payload
//!
//! Whatever happens, exactly one response line is written back and the
//! connection is closed when the session ends.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::storage::{PhotoStore, StoredPhoto};

use super::types::{
    preview, HomeworkId, SessionPolicy, SessionStage, UploadError, BMP_MAGIC,
    HOMEWORK_ID_LENGTH, SUCCESS_RESPONSE,
};

/// A single upload connection and its protocol state
pub struct UploadSession<S> {
    stream: S,
    peer: String,
    policy: SessionPolicy,
    store: PhotoStore,
    stage: SessionStage,
}

impl<S> UploadSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: impl Into<String>, policy: SessionPolicy, store: PhotoStore) -> Self {
        Self {
            stream,
            peer: peer.into(),
            policy,
            store,
            stage: SessionStage::AwaitingId,
        }
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    /// Drive the session to completion, answer the client, and close.
    ///
    /// Consumes the session so the stream is dropped exactly once.
    pub async fn run(mut self) -> Result<StoredPhoto, UploadError> {
        tracing::info!(peer = %self.peer, "Client connected");

        let outcome = self.process().await;

        let response = match &outcome {
            Ok(photo) => {
                tracing::info!(
                    peer = %self.peer,
                    homework_id = %photo.homework_id,
                    path = %photo.path.display(),
                    "Upload complete"
                );
                SUCCESS_RESPONSE.to_string()
            }
            Err(e) => {
                if let UploadError::Storage(inner) = e {
                    tracing::error!(peer = %self.peer, error = %inner, "Failed to store upload");
                } else {
                    tracing::info!(peer = %self.peer, stage = %self.stage, error = %e, "Upload rejected");
                }
                e.response()
            }
        };

        self.advance(SessionStage::Done);
        self.respond(&response).await;

        outcome
    }

    async fn process(&mut self) -> Result<StoredPhoto, UploadError> {
        let raw_id = self.read_frame(HOMEWORK_ID_LENGTH).await?;
        let homework_id = HomeworkId::parse(&raw_id)?;
        tracing::debug!(peer = %self.peer, homework_id = %homework_id, "Homework ID accepted");

        if !self.policy.delay.is_zero() {
            self.advance(SessionStage::ArtificialDelay);
            tracing::info!(peer = %self.peer, delay = ?self.policy.delay, "Sleeping");
            tokio::time::sleep(self.policy.delay).await;
        }

        self.advance(SessionStage::AwaitingPayload);
        let payload = self.read_frame(self.policy.image_size).await?;
        tracing::info!(
            peer = %self.peer,
            homework_id = %homework_id,
            head = %preview(&payload),
            "Received image data"
        );

        self.advance(SessionStage::Validating);
        if !payload.starts_with(BMP_MAGIC) {
            return Err(UploadError::BadMagic);
        }

        self.advance(SessionStage::Persisting);
        let photo = self.store.store(&homework_id, &payload).await?;

        Ok(photo)
    }

    /// Read exactly `len` bytes under a fresh deadline window
    async fn read_frame(&mut self, len: usize) -> Result<Vec<u8>, UploadError> {
        let mut buf = vec![0u8; len];
        let stage = self.stage;

        let read = self.stream.read_exact(&mut buf);
        let result = match self.policy.read_timeout {
            Some(after) => tokio::time::timeout(after, read)
                .await
                .map_err(|_| UploadError::Timeout { stage, after })?,
            None => read.await,
        };

        result.map_err(|source| UploadError::Incomplete { stage, source })?;
        Ok(buf)
    }

    fn advance(&mut self, next: SessionStage) {
        debug_assert!(next >= self.stage, "session stages only move forward");
        tracing::debug!(peer = %self.peer, from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
    }

    /// Send the terminal response and close the write half.
    ///
    /// The peer may already be gone, so failures here are only logged.
    async fn respond(&mut self, response: &str) {
        let result = async {
            self.stream.write_all(response.as_bytes()).await?;
            self.stream.flush().await?;
            self.stream.shutdown().await
        }
        .await;

        if let Err(e) = result {
            tracing::debug!(peer = %self.peer, error = %e, "Failed to deliver response");
        }
    }
}


// ============================================================================
// Tests
// ============================================================================
