//! Configuration System using Figment
//!
//! Strongly-typed configuration for the listener and the headless binary.
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/streamplt.toml` (or any path passed to [`AppConfig::load_from`])
//! 3. Environment variables prefixed with `STREAMPLT_`, `__` separating levels
//!    (e.g. `STREAMPLT_LISTENER__BUFFER_WIDTH=4`)
//!
//! # Example
//! ```no_run
//! use streamplt::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! println!("Listening on {}", config.listener.address);
//! # Ok::<(), streamplt::error::StreamError>(())
//! ```

use crate::data::record_buffer::DEFAULT_BUFFER_LENGTH;
use crate::error::{AppResult, StreamError};
use crate::tracing_init::OutputFormat;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/streamplt.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "STREAMPLT_";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener settings
    pub listener: ListenerConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Status reporting for the headless binary
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Construction parameters of a [`DataListener`](crate::listener::DataListener).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Publisher endpoint, e.g. `tcp://127.0.0.1:5555` or `ipc:///tmp/stream`
    pub address: String,
    /// Number of values expected in every message
    #[serde(default = "default_buffer_width")]
    pub buffer_width: usize,
    /// Maximum number of retained records
    #[serde(default = "default_buffer_length")]
    pub buffer_length: usize,
    /// How long `start` waits for the subscription before giving up
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: OutputFormat,
}

/// Periodic status line emitted by the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between status lines in milliseconds
    #[serde(default = "default_monitor_interval")]
    pub interval_ms: u64,
}

fn default_buffer_width() -> usize {
    1
}

fn default_buffer_length() -> usize {
    DEFAULT_BUFFER_LENGTH
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_monitor_interval() -> u64 {
    1000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: OutputFormat::default(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_monitor_interval(),
        }
    }
}

impl ListenerConfig {
    /// Listener on `address` with default width and length.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            buffer_width: default_buffer_width(),
            buffer_length: default_buffer_length(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }

    /// Set the expected number of values per message.
    pub fn with_buffer_width(mut self, width: usize) -> Self {
        self.buffer_width = width;
        self
    }

    /// Set the number of retained records.
    pub fn with_buffer_length(mut self, length: usize) -> Self {
        self.buffer_length = length;
        self
    }

    /// Set how long `start` waits for the subscription to be established.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Check the parameters before any buffer is allocated.
    pub fn validate(&self) -> AppResult<()> {
        if self.address.trim().is_empty() {
            return Err(StreamError::Configuration(
                "address must not be empty".to_string(),
            ));
        }
        if self.buffer_width == 0 {
            return Err(StreamError::Configuration(
                "buffer_width must be positive".to_string(),
            ));
        }
        if self.buffer_length == 0 {
            return Err(StreamError::Configuration(
                "buffer_length must be positive".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(StreamError::Configuration(
                "connect_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::from_figment(Self::figment(path))
    }

    /// The layered providers, for callers that merge further overrides.
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Defaults::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract and validate.
    pub fn from_figment(figment: Figment) -> AppResult<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        self.listener.validate()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(StreamError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        if self.monitor.interval_ms == 0 {
            return Err(StreamError::Configuration(
                "monitor.interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Defaults layered below the file. The address has none: it must be supplied.
#[derive(Debug, Default, Serialize)]
struct Defaults {
    logging: LoggingConfig,
    monitor: MonitorConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_file() {
        let file = write_config(
            r#"
            [listener]
            address = "tcp://127.0.0.1:5555"
            buffer_width = 4
            buffer_length = 500

            [logging]
            level = "debug"
            format = "json"

            [monitor]
            interval_ms = 250
            "#,
        );

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.listener.address, "tcp://127.0.0.1:5555");
        assert_eq!(config.listener.buffer_width, 4);
        assert_eq!(config.listener.buffer_length, 500);
        assert_eq!(config.logging.level, "debug");
        assert!(matches!(config.logging.format, OutputFormat::Json));
        assert_eq!(config.monitor.interval_ms, 250);
    }

    #[test]
    fn applies_defaults() {
        let file = write_config(
            r#"
            [listener]
            address = "ipc:///tmp/stream"
            "#,
        );

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.listener.buffer_width, 1);
        assert_eq!(config.listener.buffer_length, 1000);
        assert_eq!(config.listener.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.monitor.interval_ms, 1000);
    }

    #[test]
    fn missing_address_is_an_error() {
        let file = write_config("[logging]\nlevel = \"info\"\n");
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(StreamError::Config(_))
        ));
    }

    #[test]
    fn overrides_merge_over_file() {
        let file = write_config(
            r#"
            [listener]
            address = "ipc:///tmp/stream"
            buffer_width = 2
            "#,
        );

        let figment = AppConfig::figment(file.path())
            .merge(Serialized::default("listener.buffer_width", 7));
        let config = AppConfig::from_figment(figment).unwrap();
        assert_eq!(config.listener.buffer_width, 7);
    }

    #[test]
    fn rejects_zero_width() {
        let file = write_config(
            r#"
            [listener]
            address = "ipc:///tmp/stream"
            buffer_width = 0
            "#,
        );
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(StreamError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_invalid_log_level() {
        let config = AppConfig {
            listener: ListenerConfig::new("ipc:///tmp/stream"),
            logging: LoggingConfig {
                level: "loud".to_string(),
                format: OutputFormat::Compact,
            },
            monitor: MonitorConfig::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn listener_config_builder() {
        let config = ListenerConfig::new("inproc://a")
            .with_buffer_width(3)
            .with_buffer_length(10);
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_width, 3);

        assert!(ListenerConfig::new("  ").validate().is_err());
        assert!(ListenerConfig::new("inproc://a")
            .with_buffer_length(0)
            .validate()
            .is_err());
        assert!(ListenerConfig::new("inproc://a")
            .with_connect_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert_eq!(
            ListenerConfig::new("inproc://a")
                .with_connect_timeout(Duration::from_millis(250))
                .connect_timeout_ms,
            250
        );
    }
}
