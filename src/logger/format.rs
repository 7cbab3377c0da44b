//! Access log format module
//!
//! Supports multiple log formats:
//! - `common` (CLF-like single line)
//! - `json` (JSON structured logging)
//! - Custom patterns with variables

use chrono::Local;

/// Access log entry describing one served connection
#[derive(Debug, Clone)]
pub struct ConnectionLogEntry {
    /// Client address
    pub remote_addr: String,
    /// Accept timestamp
    pub time: chrono::DateTime<Local>,
    /// Short outcome label (responded, peer_closed, ...)
    pub outcome: &'static str,
    /// Error text for failed outcomes
    pub detail: Option<String>,
    pub bytes_read: usize,
    pub bytes_sent: usize,
    /// Time from accept to close in microseconds
    pub request_time_us: u64,
}

impl ConnectionLogEntry {
    /// Create a new entry with current timestamp
    pub fn new(remote_addr: String, outcome: &'static str) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            outcome,
            detail: None,
            bytes_read: 0,
            bytes_sent: 0,
            request_time_us: 0,
        }
    }

    /// Format the log entry according to the specified format
    pub fn format(&self, format: &str) -> String {
        match format {
            "common" => self.format_common(),
            "json" => self.format_json(),
            custom => self.format_custom(custom),
        }
    }

    /// `$remote_addr - - [$time_local] "$outcome" $bytes_read $bytes_sent $request_time`
    fn format_common(&self) -> String {
        let mut line = format!(
            "{} - - [{}] \"{}\" {} {} {:.3}",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.outcome,
            self.bytes_read,
            self.bytes_sent,
            self.request_time_secs(),
        );
        if let Some(detail) = &self.detail {
            line.push_str(&format!(" ({detail})"));
        }
        line
    }

    fn format_json(&self) -> String {
        serde_json::json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "outcome": self.outcome,
            "detail": self.detail,
            "bytes_read": self.bytes_read,
            "bytes_sent": self.bytes_sent,
            "request_time_us": self.request_time_us,
        })
        .to_string()
    }

    /// Custom format with variable substitution
    ///
    /// Supported variables:
    /// - `$remote_addr` - Client address
    /// - `$time_local` - Local time in Common Log Format
    /// - `$time_iso8601` - ISO 8601 timestamp
    /// - `$outcome` - Outcome label
    /// - `$detail` - Error text, `-` when none
    /// - `$bytes_read` - Request bytes read
    /// - `$bytes_sent` - Response bytes written
    /// - `$request_time` - Connection time in seconds (3 decimal places)
    fn format_custom(&self, pattern: &str) -> String {
        pattern
            .replace("$remote_addr", &self.remote_addr)
            .replace(
                "$time_local",
                &self.time.format("%d/%b/%Y:%H:%M:%S %z").to_string(),
            )
            .replace("$time_iso8601", &self.time.to_rfc3339())
            .replace("$outcome", self.outcome)
            .replace("$detail", self.detail.as_deref().unwrap_or("-"))
            .replace("$bytes_read", &self.bytes_read.to_string())
            .replace("$bytes_sent", &self.bytes_sent.to_string())
            .replace("$request_time", &format!("{:.3}", self.request_time_secs()))
    }

    #[allow(clippy::cast_precision_loss)]
    fn request_time_secs(&self) -> f64 {
        self.request_time_us as f64 / 1_000_000.0
    }
}
