//! A tiny TCP listener that answers every connection with a fixed payload.
//!
//! Startup resolves `localhost:<port>` to IPv4 candidates, builds a listening
//! socket from the first one, and then waits on the reactor for incoming
//! connections. Each connection gets one bounded read, one fixed response
//! and a close.

pub mod config;
pub mod error;
pub mod logger;
pub mod response;
pub mod server;

pub use config::{Config, ServeMode};
pub use error::{Result, ServerError};
pub use response::ResponseMessage;
pub use server::{Server, ShutdownSignal};
