//! Logger module
//!
//! Logging utilities for the server:
//! - Startup diagnostics (resolved addresses, socket parameters)
//! - Per-connection access logging with multiple formats
//! - Error and warning logging
//! - File-based logging support

mod format;
pub mod writer;

pub use format::ConnectionLogEntry;

use crate::config::Config;
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

pub fn log_usage(program: &str) {
    write_error(&format!("{program} [port]"));
}

pub fn log_resolved_addresses(addrs: &[SocketAddr]) {
    write_info("Resolved local addresses:");
    for addr in addrs {
        let ipver = if addr.is_ipv4() { "IPv4" } else { "IPv6" };
        write_info(&format!("  {ipver}: {}", addr.ip()));
    }
}

pub fn log_socket_info(family: &str, socket_type: &str, protocol: &str) {
    write_info("Init socket with these:");
    write_info(&format!("Family: {family}"));
    write_info(&format!("Socktype: {socket_type}"));
    write_info(&format!("Protocol: {protocol}"));
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info(&format!(
        "server is listening for incoming connections on port {} ...",
        addr.port()
    ));
    write_info(&format!("  - Bound address: {addr}"));
    write_info(&format!("  - Backlog: {}", config.server.backlog));
    write_info(&format!("  - Mode: {:?}", config.server.mode));
    write_info(&format!("  - Read buffer: {} bytes", config.server.buffer_size));
    if let Some(max) = config.server.max_connections {
        write_info(&format!("  - Max connections: {max}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("  - Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("  - Error log: {path}"));
    }
}

pub fn log_server_stop(addr: &SocketAddr) {
    write_info(&format!("[Shutdown] Listener on {addr} closed"));
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(&format!("[Connection] Accepted from: {peer_addr}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &ConnectionLogEntry, format: &str) {
    write_info(&entry.format(format));
}

pub fn log_info(message: &str) {
    write_info(message);
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}
