//! Image Server
//!
//! Accept loop for the upload protocol. Each connection gets its own task;
//! the loop never waits on a session.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, ToSocketAddrs};

use crate::storage::PhotoStore;

use super::session::UploadSession;
use super::types::SessionPolicy;

/// Pause after a failed accept (e.g. EMFILE) before trying again
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Listening side of the upload protocol
pub struct ImageServer {
    listener: TcpListener,
    policy: SessionPolicy,
    store: PhotoStore,
}

impl ImageServer {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        policy: SessionPolicy,
        store: PhotoStore,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            policy,
            store,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Sessions already running are left alone; they finish (or die with the
    /// runtime) independently of the accept loop.
    pub async fn serve<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        match self.local_addr() {
            Ok(addr) => tracing::info!(
                "======== Running on tcp://{} with {} s of delay ========",
                addr,
                self.policy.delay.as_secs_f64()
            ),
            Err(e) => tracing::warn!("Image server address unavailable: {}", e),
        }

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Image server no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let session = UploadSession::new(
                            stream,
                            peer.to_string(),
                            self.policy,
                            self.store.clone(),
                        );
                        tokio::spawn(async move {
                            // Outcomes are logged inside the session
                            let _ = session.run().await;
                        });
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                        if back_off(&mut shutdown, ACCEPT_ERROR_BACKOFF).await {
                            tracing::info!("Image server no longer accepting connections");
                            break;
                        }
                    }
                },
            }
        }
    }
}

/// Sleep for `delay` unless `shutdown` fires first. Returns true on shutdown.
async fn back_off<F>(shutdown: &mut F, delay: Duration) -> bool
where
    F: Future<Output = ()> + Unpin,
{
    tokio::select! {
        _ = shutdown => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use crate::upload::IMAGE_SIZE;

    fn bmp_payload() -> Vec<u8> {
        let mut data = vec![0x42; IMAGE_SIZE];
        data[..2].copy_from_slice(b"BM");
        data
    }

    async fn start(
        policy: SessionPolicy,
        store: PhotoStore,
    ) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let server = ImageServer::bind("127.0.0.1:0", policy, store).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(async {
            let _ = stop_rx.await;
        }));
        (addr, stop_tx, handle)
    }

    async fn upload(addr: SocketAddr, id: &[u8], payload: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(id).await.unwrap();
        stream.write_all(payload).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_upload_over_tcp() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());
        let (addr, _stop, _handle) = start(SessionPolicy::default(), store.clone()).await;

        let payload = bmp_payload();
        assert_eq!(upload(addr, b"123456789", &payload).await, "SUCCESS");

        let photos = store.list(&"123456789".parse().unwrap()).await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(std::fs::read(&photos[0].path).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_slow_session_does_not_block_others() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());
        let policy = SessionPolicy {
            read_timeout: Some(Duration::from_secs(5)),
            ..SessionPolicy::default()
        };
        let (addr, _stop, _handle) = start(policy, store.clone()).await;

        // Connects and then stalls mid-id
        let mut stalled = TcpStream::connect(addr).await.unwrap();
        stalled.write_all(b"1234").await.unwrap();

        let response = tokio::time::timeout(
            Duration::from_secs(2),
            upload(addr, b"ABCDEF123", &bmp_payload()),
        )
        .await
        .expect("second client should be served while the first stalls");
        assert_eq!(response, "SUCCESS");
    }

    #[tokio::test]
    async fn test_uploads_accumulate_per_homework_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());
        let (addr, _stop, _handle) = start(SessionPolicy::default(), store.clone()).await;

        assert_eq!(upload(addr, b"123456789", &bmp_payload()).await, "SUCCESS");
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(upload(addr, b"123456789", &bmp_payload()).await, "SUCCESS");

        let photos = store.list(&"123456789".parse().unwrap()).await.unwrap();
        assert_eq!(photos.len(), 2);
        assert!(photos[0].file_name > photos[1].file_name);
    }

    #[tokio::test]
    async fn test_invalid_id_over_tcp_creates_no_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());
        let (addr, _stop, _handle) = start(SessionPolicy::default(), store).await;

        let response = upload(addr, b"zzzzzzzzz", b"").await;
        assert!(response.starts_with("ERROR: Invalid homework ID"));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_back_off_waits_out_the_delay() {
        let mut never = Box::pin(std::future::pending::<()>());
        let started = tokio::time::Instant::now();

        let stopped = back_off(&mut never, Duration::from_millis(100)).await;

        assert!(!stopped);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_back_off_yields_to_shutdown() {
        let mut ready = Box::pin(std::future::ready(()));

        let stopped = tokio::time::timeout(
            Duration::from_secs(1),
            back_off(&mut ready, Duration::from_secs(60)),
        )
        .await
        .expect("shutdown should cut the backoff short");

        assert!(stopped);
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());
        let (_addr, stop, handle) = start(SessionPolicy::default(), store).await;

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("accept loop should exit on shutdown")
            .unwrap();
    }
}
