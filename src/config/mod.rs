//! # Configuration Management Module
//!
//! Settings for the `stxframe` binary: which serial link to open, how large the
//! decoder buffer is, and where logs go.
//!
//! ## Configuration File Format
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! read_timeout_ms = 500
//! read_chunk = 1024
//!
//! [decoder]
//! capacity = 256
//! log_payloads = false
//!
//! [logging]
//! level = "info"
//! file = "stxframe.log"
//! ```
//!
//! Every section is optional; missing sections and keys fall back to defaults.
//! CLI flags take precedence over file values.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stxframe::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     config.validate()?;
//!     println!("Serial Port: {}", config.serial.port);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::protocol::{MAX_CAPACITY, MIN_CAPACITY};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Read timeout per poll; a timeout is not an error, just an idle link.
    pub read_timeout_ms: u64,
    /// Bytes requested per read call.
    pub read_chunk: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            read_timeout_ms: 500,
            read_chunk: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Payload buffer size; declared lengths must be strictly below it.
    pub capacity: usize,
    /// Log every decoded payload (hex) at debug level.
    pub log_payloads: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_CAPACITY,
            log_payloads: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Parsed `level`, falling back to `Info` for unknown names.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Load `path` if it exists. A missing file yields `None`; a file that
    /// cannot be read or parsed is still an error.
    pub async fn load_if_present(path: &str) -> Result<Option<Self>> {
        match fs::metadata(path).await {
            Ok(_) => Self::load(path).await.map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow!("Failed to read config file {}: {}", path, e)),
        }
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::Error;
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&self.decoder.capacity) {
            return Err(Error::Config(format!(
                "decoder.capacity must be between {} and {}, got {}",
                MIN_CAPACITY, MAX_CAPACITY, self.decoder.capacity
            )));
        }
        if self.serial.baud_rate == 0 {
            return Err(Error::Config("serial.baud_rate must be non-zero".to_string()));
        }
        if self.serial.read_chunk == 0 {
            return Err(Error::Config("serial.read_chunk must be non-zero".to_string()));
        }
        Ok(())
    }
}
