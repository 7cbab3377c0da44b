// Server module entry point
// resolve -> listener -> readiness loop -> per-connection lifecycle

pub mod connection;
pub mod listener;
pub mod monitor;
pub mod resolve;
pub mod signal;

// `loop` is a keyword, so the file is mounted as `server_loop`
#[path = "loop.rs"]
pub mod server_loop;

pub use connection::{ConnectionContext, ConnectionOutcome, ConnectionReport};
pub use listener::{create_listener, ListenerOptions};
pub use resolve::{resolve, ResolvedAddress};
pub use server_loop::{start_server_loop, ServerLoopConfig};
pub use signal::{start_signal_handler, ShutdownSignal};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::{Config, BIND_HOST};
use crate::error::Result;
use crate::logger;

/// A bound, listening server that has not started accepting yet
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: Config,
    shutdown: Arc<ShutdownSignal>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Resolve, create, bind and listen. Must be called inside a tokio runtime.
    pub async fn bind(config: Config) -> Result<Self> {
        let resolved = resolve(BIND_HOST, &config.server.port).await?;
        logger::log_resolved_addresses(resolved.candidates());

        let listener = create_listener(
            resolved,
            ListenerOptions {
                reuse_address: config.server.reuse_address,
                backlog: config.server.backlog,
            },
        )?;
        let local_addr = self::listener::bound_addr(&listener)?;

        Ok(Self {
            listener,
            local_addr,
            config,
            shutdown: Arc::new(ShutdownSignal::new()),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle that stops `run` when triggered
    pub fn shutdown_handle(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.shutdown)
    }

    /// Live count of connections being served
    pub fn active_connections(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.active_connections)
    }

    /// Serve until shutdown; returns the number of accepted connections
    pub async fn run(self) -> u64 {
        logger::log_server_start(&self.local_addr, &self.config);

        let ctx = Arc::new(ConnectionContext::from_config(&self.config));
        let loop_config = ServerLoopConfig {
            mode: self.config.server.mode,
            max_connections: self.config.server.max_connections,
            shutdown_grace: self.config.server.shutdown_grace(),
        };

        let accepted = start_server_loop(
            self.listener,
            ctx,
            loop_config,
            self.shutdown,
            Arc::clone(&self.active_connections),
        )
        .await;

        logger::log_info(&format!(
            "[Shutdown] Served {accepted} connection(s), {} still open",
            self.active_connections.load(Ordering::SeqCst)
        ));
        accepted
    }
}
