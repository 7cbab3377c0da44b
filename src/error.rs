//! Error types for the server
//!
//! Startup failures (resolve, socket, option, bind, listen, reactor
//! registration) are returned to the caller, which decides they are fatal.
//! Accept failures happen inside the loop and are only ever logged.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types
#[derive(Debug, Error)]
pub enum ServerError {
    /// The port could not be turned into a bindable local address
    #[error("getaddrinfo error for {host}:{port}: {reason}")]
    Resolution {
        host: String,
        port: String,
        reason: String,
    },

    /// `socket()` failed
    #[error("socket error: {0}")]
    SocketCreate(#[source] io::Error),

    /// `setsockopt()` failed
    #[error("setsockopt error: {0}")]
    SocketOption(#[source] io::Error),

    /// `bind()` failed (port in use, insufficient privilege, ...)
    #[error("bind error on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// `listen()` failed
    #[error("listen error: {0}")]
    Listen(#[source] io::Error),

    /// Registering the listener with the readiness reactor failed
    #[error("poll error: {0}")]
    Poll(#[source] io::Error),

    /// `accept()` failed on the listening socket
    #[error("accept error: {0}")]
    Accept(#[source] io::Error),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// The async runtime could not be built
    #[error("runtime error: {0}")]
    Runtime(#[source] io::Error),

    /// Log files could not be opened
    #[error("logger error: {0}")]
    Logger(#[source] io::Error),

    /// Signal handlers could not be installed
    #[error("signal error: {0}")]
    Signal(#[source] io::Error),
}

impl ServerError {
    /// Whether the error should stop the process.
    ///
    /// Everything except an accept failure is a one-time startup condition
    /// that cannot fix itself by retrying.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Accept(_))
    }

    /// Whether the bind failed because the address is already taken
    pub fn is_addr_in_use(&self) -> bool {
        matches!(
            self,
            Self::Bind { source, .. } if source.kind() == io::ErrorKind::AddrInUse
        )
    }
}

impl From<config::ConfigError> for ServerError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_is_not_fatal() {
        let err = ServerError::Accept(io::Error::from(io::ErrorKind::ConnectionAborted));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_startup_errors_are_fatal() {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let errors = [
            ServerError::SocketCreate(io::Error::from(io::ErrorKind::Other)),
            ServerError::SocketOption(io::Error::from(io::ErrorKind::Other)),
            ServerError::Bind {
                addr,
                source: io::Error::from(io::ErrorKind::AddrInUse),
            },
            ServerError::Listen(io::Error::from(io::ErrorKind::Other)),
            ServerError::Poll(io::Error::from(io::ErrorKind::Other)),
        ];
        for err in &errors {
            assert!(err.is_fatal(), "{err} should be fatal");
        }
    }

    #[test]
    fn test_addr_in_use_detection() {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let err = ServerError::Bind {
            addr,
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(err.is_addr_in_use());
        assert!(err.to_string().contains("127.0.0.1:9999"));

        let err = ServerError::Listen(io::Error::from(io::ErrorKind::AddrInUse));
        assert!(!err.is_addr_in_use());
    }

    #[test]
    fn test_resolution_message() {
        let err = ServerError::Resolution {
            host: "localhost".to_string(),
            port: "http!".to_string(),
            reason: "invalid port".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "getaddrinfo error for localhost:http!: invalid port"
        );
    }
}
