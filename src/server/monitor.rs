// Readiness monitor module
// Waits for the listening socket to become readable or for shutdown

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

use super::signal::ShutdownSignal;
use crate::error::{Result, ServerError};

const ACCEPT_BACKOFF_BASE_MS: u64 = 10;
const ACCEPT_BACKOFF_MAX_MS: u64 = 1000;

/// What woke the monitor up
#[derive(Debug)]
pub enum Readiness {
    /// A pending connection was pulled off the accept queue
    Incoming(TcpStream, SocketAddr),
    /// Shutdown was requested
    Shutdown,
}

/// Watches the listening socket. Accepted connections are never registered.
pub struct ReadinessMonitor<'a> {
    listener: &'a TcpListener,
    shutdown: &'a ShutdownSignal,
    consecutive_errors: u32,
}

impl<'a> ReadinessMonitor<'a> {
    pub const fn new(listener: &'a TcpListener, shutdown: &'a ShutdownSignal) -> Self {
        Self {
            listener,
            shutdown,
            consecutive_errors: 0,
        }
    }

    /// Block until a connection is pending or shutdown is requested. No timeout.
    ///
    /// Shutdown takes priority over pending connections.
    pub async fn wait(&mut self) -> Result<Readiness> {
        let result = tokio::select! {
            biased;
            () = self.shutdown.wait() => return Ok(Readiness::Shutdown),
            accepted = self.listener.accept() => accepted,
        };

        match result {
            Ok((stream, peer)) => {
                self.consecutive_errors = 0;
                Ok(Readiness::Incoming(stream, peer))
            }
            Err(e) => {
                self.consecutive_errors = self.consecutive_errors.saturating_add(1);
                Err(ServerError::Accept(e))
            }
        }
    }

    /// Delay before polling again after an accept failure
    pub const fn backoff(&self) -> Duration {
        calculate_backoff(
            self.consecutive_errors,
            ACCEPT_BACKOFF_BASE_MS,
            ACCEPT_BACKOFF_MAX_MS,
        )
    }
}

/// Exponential backoff: 0 for attempt 0, then base, 2*base, ... capped at `max_ms`
pub const fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }
    let exponential = 2u64.saturating_pow(attempt - 1);
    let delay = base_ms.saturating_mul(exponential);
    let capped = if delay < max_ms { delay } else { max_ms };
    Duration::from_millis(capped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::listener::{create_listener, ListenerOptions};
    use crate::server::resolve::resolve;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 10, 1000), Duration::ZERO);
        assert_eq!(calculate_backoff(1, 10, 1000), Duration::from_millis(10));
        assert_eq!(calculate_backoff(2, 10, 1000), Duration::from_millis(20));
        assert_eq!(calculate_backoff(4, 10, 1000), Duration::from_millis(80));
        assert_eq!(calculate_backoff(30, 10, 1000), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(u32::MAX, 10, 1000), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_wait_reports_incoming_connection() {
        let listener = create_listener(
            resolve("localhost", "0").await.unwrap(),
            ListenerOptions::default(),
        )
        .unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let mut monitor = ReadinessMonitor::new(&listener, &shutdown);

        let _client = TcpStream::connect(addr).await.unwrap();
        match monitor.wait().await.unwrap() {
            Readiness::Incoming(_, peer) => assert!(peer.ip().is_loopback()),
            Readiness::Shutdown => panic!("expected a connection"),
        }
        assert_eq!(monitor.backoff(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_shutdown_wins_over_pending_connection() {
        let listener = create_listener(
            resolve("localhost", "0").await.unwrap(),
            ListenerOptions::default(),
        )
        .unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let _client = TcpStream::connect(addr).await.unwrap();
        shutdown.trigger();

        let mut monitor = ReadinessMonitor::new(&listener, &shutdown);
        assert!(matches!(monitor.wait().await.unwrap(), Readiness::Shutdown));
    }
}
