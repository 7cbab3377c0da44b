// Connection lifecycle module
// One bounded read, one fixed response, then close

use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::Config;
use crate::logger::{self, ConnectionLogEntry};
use crate::response::ResponseMessage;

/// Read-only settings shared by every connection
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub response: ResponseMessage,
    pub buffer_size: usize,
    pub read_timeout: Option<Duration>,
    pub linger: Duration,
    pub respond_on_read_error: bool,
    pub access_log: bool,
    pub access_log_format: String,
}

impl ConnectionContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            response: ResponseMessage::new(&config.response.body),
            buffer_size: config.server.buffer_size,
            read_timeout: config.server.read_timeout(),
            linger: config.server.linger(),
            respond_on_read_error: config.server.respond_on_read_error,
            access_log: config.logging.access_log,
            access_log_format: config.logging.access_log_format.clone(),
        }
    }
}

/// How a connection ended
#[derive(Debug)]
pub enum ConnectionOutcome {
    /// Request read and response written
    Responded,
    /// Peer closed before sending anything
    PeerClosed,
    /// The read failed
    ReadFailed(io::Error),
    /// Nothing arrived within the read timeout
    ReadTimedOut,
    /// The request was read but the response could not be written
    WriteFailed(io::Error),
}

impl ConnectionOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Responded => "responded",
            Self::PeerClosed => "peer_closed",
            Self::ReadFailed(_) => "read_failed",
            Self::ReadTimedOut => "read_timed_out",
            Self::WriteFailed(_) => "write_failed",
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            Self::ReadFailed(e) | Self::WriteFailed(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

/// Summary of one served connection
#[derive(Debug)]
pub struct ConnectionReport {
    pub peer: SocketAddr,
    pub outcome: ConnectionOutcome,
    pub bytes_read: usize,
    pub bytes_sent: usize,
    pub elapsed: Duration,
}

impl ConnectionReport {
    pub const fn responded(&self) -> bool {
        self.bytes_sent > 0
    }

    fn log_entry(&self) -> ConnectionLogEntry {
        let mut entry = ConnectionLogEntry::new(self.peer.to_string(), self.outcome.label());
        entry.detail = self.outcome.detail();
        entry.bytes_read = self.bytes_read;
        entry.bytes_sent = self.bytes_sent;
        entry.request_time_us = u64::try_from(self.elapsed.as_micros()).unwrap_or(u64::MAX);
        entry
    }
}

/// Serve one accepted connection to completion.
///
/// Performs exactly one read of at most `buffer_size` bytes; anything beyond
/// that is never looked at. An empty read closes without responding. Failed
/// or timed out reads still get the response unless `respond_on_read_error`
/// is turned off. Connection errors never escape; they are
/// reported in the returned `ConnectionReport`.
pub async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    ctx: &ConnectionContext,
) -> ConnectionReport {
    let started = Instant::now();
    let mut buf = vec![0u8; ctx.buffer_size];
    let mut bytes_read = 0;
    let mut bytes_sent = 0;

    let outcome = match read_request(&mut stream, &mut buf, ctx.read_timeout).await {
        Ok(Some(0)) => ConnectionOutcome::PeerClosed,
        Ok(Some(n)) => {
            bytes_read = n;
            match send_response(&mut stream, &ctx.response).await {
                Ok(n) => {
                    bytes_sent = n;
                    ConnectionOutcome::Responded
                }
                Err(e) => ConnectionOutcome::WriteFailed(e),
            }
        }
        Ok(None) => {
            if ctx.respond_on_read_error {
                bytes_sent = respond_after_failed_read(&mut stream, peer, ctx).await;
            }
            ConnectionOutcome::ReadTimedOut
        }
        Err(e) => {
            if ctx.respond_on_read_error {
                bytes_sent = respond_after_failed_read(&mut stream, peer, ctx).await;
            }
            ConnectionOutcome::ReadFailed(e)
        }
    };

    if bytes_sent > 0 {
        linger_close(stream, &mut buf, ctx.linger).await;
    } else {
        drop(stream);
    }

    let report = ConnectionReport {
        peer,
        outcome,
        bytes_read,
        bytes_sent,
        elapsed: started.elapsed(),
    };

    match &report.outcome {
        ConnectionOutcome::ReadFailed(e) => {
            logger::log_warning(&format!("Read from {peer} failed: {e}"));
        }
        ConnectionOutcome::WriteFailed(e) => {
            logger::log_warning(&format!("Write to {peer} failed: {e}"));
        }
        _ => {}
    }
    if ctx.access_log {
        logger::log_access(&report.log_entry(), &ctx.access_log_format);
    }
    report
}

/// Single bounded read. `Ok(None)` means the timeout elapsed.
async fn read_request(
    stream: &mut TcpStream,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> io::Result<Option<usize>> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, stream.read(buf)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        },
        None => stream.read(buf).await.map(Some),
    }
}

/// Best-effort response when the read did not succeed; write errors are logged
async fn respond_after_failed_read(
    stream: &mut TcpStream,
    peer: SocketAddr,
    ctx: &ConnectionContext,
) -> usize {
    match send_response(stream, &ctx.response).await {
        Ok(n) => n,
        Err(e) => {
            logger::log_warning(&format!("Write to {peer} after failed read failed: {e}"));
            0
        }
    }
}

async fn send_response(stream: &mut TcpStream, response: &ResponseMessage) -> io::Result<usize> {
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(response.len())
}

/// Half-close, then discard unread input for up to `linger` before dropping.
///
/// Closing a socket with unread data makes the kernel send RST, which can
/// destroy the response before the peer reads it.
async fn linger_close(mut stream: TcpStream, scratch: &mut [u8], linger: Duration) {
    if stream.shutdown().await.is_err() {
        return;
    }
    let _ = tokio::time::timeout(linger, async {
        loop {
            match stream.read(scratch).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn test_context() -> ConnectionContext {
        ConnectionContext {
            response: ResponseMessage::new("Hatsune Miku is cute"),
            buffer_size: 1024,
            read_timeout: None,
            linger: Duration::from_millis(200),
            respond_on_read_error: true,
            access_log: false,
            access_log_format: "common".to_string(),
        }
    }

    /// Accept one connection and serve it with `ctx` in a background task
    async fn serve_one(
        ctx: ConnectionContext,
    ) -> (SocketAddr, tokio::task::JoinHandle<ConnectionReport>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            serve_connection(stream, peer, &ctx).await
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_request_gets_fixed_response() {
        let (addr, handle) = serve_one(test_context()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / ignored").await.unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        drop(client);

        assert_eq!(reply, b"HTTP1.1 200 ok\r\n\r\nHatsune Miku is cute");
        let report = handle.await.unwrap();
        assert!(matches!(report.outcome, ConnectionOutcome::Responded));
        assert_eq!(report.bytes_read, 13);
        assert_eq!(report.bytes_sent, reply.len());
    }

    #[tokio::test]
    async fn test_peer_close_gets_no_response() {
        let (addr, handle) = serve_one(test_context()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.shutdown().await.unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();

        assert!(reply.is_empty());
        let report = handle.await.unwrap();
        assert!(matches!(report.outcome, ConnectionOutcome::PeerClosed));
        assert!(!report.responded());
    }

    #[tokio::test]
    async fn test_oversized_request_is_truncated() {
        let (addr, handle) = serve_one(test_context()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&[b'x'; 4096]).await.unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        drop(client);

        assert_eq!(reply, b"HTTP1.1 200 ok\r\n\r\nHatsune Miku is cute");
        let report = handle.await.unwrap();
        assert!(report.bytes_read > 0 && report.bytes_read <= 1024);
    }

    #[tokio::test]
    async fn test_read_timeout_closes_without_response() {
        let mut ctx = test_context();
        ctx.read_timeout = Some(Duration::from_millis(50));
        ctx.respond_on_read_error = false;
        let (addr, handle) = serve_one(ctx).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();

        assert!(reply.is_empty());
        let report = handle.await.unwrap();
        assert!(matches!(report.outcome, ConnectionOutcome::ReadTimedOut));
    }

    #[tokio::test]
    async fn test_respond_on_read_error_sends_response_after_timeout() {
        let mut ctx = test_context();
        ctx.read_timeout = Some(Duration::from_millis(50));
        ctx.respond_on_read_error = true;
        let (addr, handle) = serve_one(ctx).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        drop(client);

        assert_eq!(reply, b"HTTP1.1 200 ok\r\n\r\nHatsune Miku is cute");
        let report = handle.await.unwrap();
        assert!(matches!(report.outcome, ConnectionOutcome::ReadTimedOut));
        assert!(report.responded());
    }

    /// Connect, wait until the server is reading, then abort with RST
    async fn connect_and_reset(addr: SocketAddr) {
        let client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        socket2::SockRef::from(&client)
            .set_linger(Some(Duration::ZERO))
            .unwrap();
        drop(client);
    }

    #[tokio::test]
    async fn test_reset_during_read_is_read_failure() {
        let (addr, handle) = serve_one(test_context()).await;
        connect_and_reset(addr).await;

        let report = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("connection should finish")
            .unwrap();
        assert!(
            matches!(report.outcome, ConnectionOutcome::ReadFailed(_)),
            "got {:?}",
            report.outcome
        );
        assert_eq!(report.bytes_read, 0);
    }

    #[tokio::test]
    async fn test_reset_during_read_without_response_on_error() {
        let mut ctx = test_context();
        ctx.respond_on_read_error = false;
        let (addr, handle) = serve_one(ctx).await;
        connect_and_reset(addr).await;

        let report = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("connection should finish")
            .unwrap();
        assert!(matches!(report.outcome, ConnectionOutcome::ReadFailed(_)));
        assert!(!report.responded());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ConnectionOutcome::Responded.label(), "responded");
        assert_eq!(ConnectionOutcome::PeerClosed.label(), "peer_closed");
        let err = ConnectionOutcome::ReadFailed(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(err.label(), "read_failed");
        assert!(err.detail().is_some());
    }
}
