// Fixed response payload
//
// The status line is sent exactly as `HTTP1.1 200 ok` (no slash between the
// protocol name and version) and is followed by an empty line and the body.
// No headers are emitted.

use std::sync::Arc;

/// Status line plus the blank line separating it from the body
pub const STATUS_LINE: &str = "HTTP1.1 200 ok\r\n\r\n";

/// The reply sent to every served connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMessage {
    bytes: Arc<[u8]>,
}

impl ResponseMessage {
    pub fn new(body: &str) -> Self {
        let mut buf = Vec::with_capacity(STATUS_LINE.len() + body.len());
        buf.extend_from_slice(STATUS_LINE.as_bytes());
        buf.extend_from_slice(body.as_bytes());
        Self {
            bytes: Arc::from(buf),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
