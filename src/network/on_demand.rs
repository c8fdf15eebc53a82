//! On-demand TCP sends
//!
//! Each send opens a fresh connection, writes the payload, lingers briefly
//! for a reply and closes. The connect is bounded by a fixed timeout and the
//! whole operation is attempted once.

use crate::network::errors::{from_io_error, NetworkError};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const RESPONSE_LINGER: Duration = Duration::from_millis(500);

const READ_BUFFER_LENGTH: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct OnDemandSender {
    host: String,
    port: u16,
}

impl OnDemandSender {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Send `payload` over a new connection.
    ///
    /// Resolves with the last chunk received during the linger window, if
    /// any. Earlier chunks in the same window are discarded.
    pub async fn send(&self, payload: &[u8]) -> Result<Option<Vec<u8>>, NetworkError> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        self.send_via(connect, payload).await
    }

    async fn send_via<F>(&self, connect: F, payload: &[u8]) -> Result<Option<Vec<u8>>, NetworkError>
    where
        F: Future<Output = std::io::Result<TcpStream>>,
    {
        let target = self.target();
        let started = Instant::now();

        let mut stream = match timeout(CONNECT_TIMEOUT, connect).await {
            Err(_) => {
                return Err(NetworkError::ConnectionTimeout {
                    target,
                    elapsed: started.elapsed(),
                })
            }
            Ok(Err(e)) => return Err(from_io_error(e, &target)),
            Ok(Ok(stream)) => stream,
        };

        tracing::debug!("On-demand connection to {} open", target);
        stream
            .write_all(payload)
            .await
            .map_err(|e| from_io_error(e, &target))?;

        let deadline = Instant::now() + RESPONSE_LINGER;
        let mut buf = vec![0u8; READ_BUFFER_LENGTH];
        let mut last = None;

        loop {
            match timeout_at(deadline, stream.read(&mut buf)).await {
                Err(_) => break,
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => last = Some(buf[..n].to_vec()),
                Ok(Err(e)) => return Err(from_io_error(e, &target)),
            }
        }

        let _ = stream.shutdown().await;
        tracing::debug!(
            "On-demand connection to {} closed after {:?}",
            target,
            started.elapsed()
        );
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_send_and_collect_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(b"OK\r\n").await.unwrap();
            buf
        });

        let sender = OnDemandSender::new("127.0.0.1", port);
        let response = sender.send(b"PWR\n").await.unwrap();

        assert_eq!(response, Some(b"OK\r\n".to_vec()));
        assert_eq!(&server.await.unwrap(), b"PWR\n");
    }

    #[tokio::test]
    async fn test_last_chunk_wins() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(b"first").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            sock.write_all(b"second").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let sender = OnDemandSender::new("127.0.0.1", port);
        let response = sender.send(b"?").await.unwrap();
        assert_eq!(response, Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_no_response_resolves_empty() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let sender = OnDemandSender::new("127.0.0.1", port);
        let started = std::time::Instant::now();
        assert_eq!(sender.send(b"x").await.unwrap(), None);
        assert!(started.elapsed() >= RESPONSE_LINGER);
    }

    #[tokio::test]
    async fn test_refused_rejects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sender = OnDemandSender::new("127.0.0.1", port);
        let err = sender.send(b"x").await.unwrap_err();
        assert!(matches!(err, NetworkError::ConnectionRefused { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_host_times_out() {
        let sender = OnDemandSender::new("192.0.2.1", 7000);
        let started = Instant::now();

        let err = sender
            .send_via(std::future::pending(), b"x")
            .await
            .unwrap_err();

        match err {
            NetworkError::ConnectionTimeout { elapsed, .. } => {
                assert!(elapsed >= CONNECT_TIMEOUT);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(started.elapsed() < CONNECT_TIMEOUT + Duration::from_secs(1));
    }
}
