// Listener setup module
// Creates, configures, binds and registers the listening socket

use socket2::Socket;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use super::resolve::ResolvedAddress;
use crate::error::{Result, ServerError};
use crate::logger;

/// Socket-level options applied before binding
#[derive(Debug, Clone, Copy)]
pub struct ListenerOptions {
    /// Set `SO_REUSEADDR` so a restarted server can rebind a port in `TIME_WAIT`
    pub reuse_address: bool,
    /// Pending connection queue length passed to `listen()`
    pub backlog: i32,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            reuse_address: true,
            backlog: 10,
        }
    }
}

/// Build a listening socket from the first resolved candidate.
///
/// `SO_REUSEPORT` is never set: a second live listener on the same port
/// must fail with a bind error. The resolved address is consumed and
/// dropped once the socket is bound.
pub fn create_listener(resolved: ResolvedAddress, options: ListenerOptions) -> Result<TcpListener> {
    let addr = resolved.first();
    logger::log_socket_info(
        &format!("{:?}", resolved.domain),
        &format!("{:?}", resolved.socket_type),
        &format!("{:?}", resolved.protocol),
    );

    let socket = Socket::new(resolved.domain, resolved.socket_type, Some(resolved.protocol))
        .map_err(ServerError::SocketCreate)?;

    if options.reuse_address {
        socket
            .set_reuse_address(true)
            .map_err(ServerError::SocketOption)?;
    }

    // Non-blocking mode for the async reactor
    socket
        .set_nonblocking(true)
        .map_err(ServerError::SocketOption)?;

    socket
        .bind(&addr.into())
        .map_err(|source| ServerError::Bind { addr, source })?;
    drop(resolved);

    socket.listen(options.backlog).map_err(ServerError::Listen)?;

    // socket2::Socket -> std::net::TcpListener -> tokio::net::TcpListener
    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener).map_err(ServerError::Poll)
}

/// Address the listener actually bound to (resolves port 0)
pub fn bound_addr(listener: &TcpListener) -> Result<SocketAddr> {
    listener.local_addr().map_err(ServerError::Listen)
}
