// Configuration module entry point
// Loads layered configuration: defaults, optional file, environment, CLI port

mod types;

pub use types::{Config, LoggingConfig, ResponseConfig, ServeMode, ServerConfig, BIND_HOST};

use crate::error::{Result, ServerError};

/// Default config file name (without extension), looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "lil_webserv";

/// Environment variable prefix, e.g. `LIL_WEBSERV__SERVER__MODE=concurrent`
pub const ENV_PREFIX: &str = "LIL_WEBSERV";

/// Body sent after the status line to every client
pub const DEFAULT_RESPONSE_BODY: &str = "Hatsune Miku is cute";

impl Config {
    /// Load configuration for `port` using the default config file name
    pub fn load(port: &str) -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE, port)
    }

    /// Load configuration from specified file path (without extension).
    /// The file is optional; the port given on the command line always wins.
    pub fn load_from(config_path: &str, port: &str) -> Result<Self> {
        let builder = Self::defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("server.port", port)?;

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from an in-memory TOML document
    pub fn from_toml(source: &str, port: &str) -> Result<Self> {
        let cfg: Self = Self::defaults()?
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .set_override("server.port", port)?
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Configuration with every default and the given port
    pub fn with_port(port: &str) -> Result<Self> {
        Self::from_toml("", port)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("server.backlog", 10)?
            .set_default("server.buffer_size", 1024)?
            .set_default("server.reuse_address", true)?
            .set_default("server.mode", "serial")?
            .set_default("server.linger_ms", 500)?
            .set_default("server.shutdown_grace_ms", 5000)?
            .set_default("server.respond_on_read_error", true)?
            .set_default("response.body", DEFAULT_RESPONSE_BODY)?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "common")?)
    }

    /// Reject values the listener cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.server.buffer_size == 0 {
            return Err(ServerError::Config(
                "server.buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.server.backlog <= 0 {
            return Err(ServerError::Config(format!(
                "server.backlog must be positive, got {}",
                self.server.backlog
            )));
        }
        if self.server.workers == Some(0) {
            return Err(ServerError::Config(
                "server.workers must be greater than 0 when set".to_string(),
            ));
        }
        if self.server.max_connections == Some(0) {
            return Err(ServerError::Config(
                "server.max_connections must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}
