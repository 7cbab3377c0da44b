// Server loop module
// Waits on the readiness monitor and hands each connection to the lifecycle

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

use super::connection::{serve_connection, ConnectionContext};
use super::monitor::{Readiness, ReadinessMonitor};
use super::signal::ShutdownSignal;
use crate::config::ServeMode;
use crate::logger;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for server loop behavior
#[derive(Debug, Clone, Copy)]
pub struct ServerLoopConfig {
    pub mode: ServeMode,
    pub max_connections: Option<usize>,
    pub shutdown_grace: Duration,
}

/// Decrements the active connection counter when the connection is done
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Run until shutdown is requested, then close the listener.
///
/// Accept failures are logged and retried after a backoff; they never end
/// the loop. In `Serial` mode each connection is served inline, so the next
/// one is not accepted until the previous one is closed; a shutdown request
/// drops the connection in progress. Returns the number of connections
/// accepted.
pub async fn start_server_loop(
    listener: TcpListener,
    ctx: Arc<ConnectionContext>,
    config: ServerLoopConfig,
    shutdown: Arc<ShutdownSignal>,
    active_connections: Arc<AtomicUsize>,
) -> u64 {
    let local_addr = listener.local_addr().ok();
    let mut accepted: u64 = 0;

    {
        let mut monitor = ReadinessMonitor::new(&listener, &shutdown);
        loop {
            match monitor.wait().await {
                Ok(Readiness::Incoming(stream, peer)) => {
                    accepted += 1;
                    dispatch(stream, peer, &ctx, &config, &shutdown, &active_connections).await;
                }
                Ok(Readiness::Shutdown) => break,
                Err(e) => {
                    let delay = monitor.backoff();
                    logger::log_error(&format!(
                        "Failed to accept connection: {e} (retrying in {}ms)",
                        delay.as_millis()
                    ));
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = shutdown.wait() => break,
                    }
                }
            }
        }
    }

    drop(listener);
    if let Some(addr) = local_addr {
        logger::log_server_stop(&addr);
    }

    drain_connections(&active_connections, config.shutdown_grace).await;
    accepted
}

/// Check connection limits, then serve inline or on a new task
async fn dispatch(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: &Arc<ConnectionContext>,
    config: &ServerLoopConfig,
    shutdown: &ShutdownSignal,
    active_connections: &Arc<AtomicUsize>,
) {
    // Increment counter first, then check limit
    let prev_count = active_connections.fetch_add(1, Ordering::SeqCst);
    let guard = ActiveGuard(Arc::clone(active_connections));

    if let Some(max_conn) = config.max_connections {
        if prev_count >= max_conn {
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer} rejected."
            ));
            drop(stream);
            return;
        }
    }

    if ctx.access_log {
        logger::log_connection_accepted(&peer);
    }

    match config.mode {
        ServeMode::Serial => {
            // A silent client must not hold off shutdown
            tokio::select! {
                _ = serve_connection(stream, peer, ctx) => {}
                () = shutdown.wait() => {
                    logger::log_warning(&format!(
                        "Shutdown requested, dropping connection from {peer}"
                    ));
                }
            }
            drop(guard);
        }
        ServeMode::Concurrent => {
            let ctx = Arc::clone(ctx);
            tokio::spawn(async move {
                let _guard = guard;
                serve_connection(stream, peer, &ctx).await;
            });
        }
    }
}

/// Wait for in-flight connections to finish, at most `grace`
async fn drain_connections(active_connections: &AtomicUsize, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        let remaining = active_connections.load(Ordering::SeqCst);
        if remaining == 0 {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Shutdown grace period elapsed with {remaining} connection(s) still open"
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}
