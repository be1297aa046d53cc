//! Instrument configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/instruments.toml` (or an explicit path)
//! 2. Environment variables prefixed with `RFDAQ_`, nested keys split on `__`
//!
//! ```text
//! RFDAQ_APPLICATION__LOG_LEVEL=debug
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rf_daq::config::RfDaqConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = RfDaqConfig::load()?;
//!     for instrument in config.enabled_instruments() {
//!         println!("{} -> {}", instrument.id, instrument.resource);
//!     }
//!     Ok(())
//! }
//! ```

use crate::error::{AppResult, DaqError};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/instruments.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "RFDAQ_";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RfDaqConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Instrument definitions
    #[serde(default)]
    pub instruments: Vec<InstrumentDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

/// Which driver opens an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverKind {
    /// Rohde & Schwarz FSV3000 spectrum analyzer
    #[serde(rename = "fsv3000")]
    Fsv3000,
    /// Anritsu MS464xB vector network analyzer
    #[serde(rename = "ms464xb")]
    Ms464xB,
}

impl DriverKind {
    /// Configuration spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Fsv3000 => "fsv3000",
            DriverKind::Ms464xB => "ms464xb",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instrument in the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentDefinition {
    /// Unique instrument identifier
    pub id: String,
    /// Driver family
    pub driver: DriverKind,
    /// VISA resource string (e.g. "TCPIP0::192.168.1.100::INSTR")
    pub resource: String,
    /// Per-exchange timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Whether this instrument is opened
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Reset and set up the instrument on connect (network analyzers)
    #[serde(default = "default_true")]
    pub init: bool,
    /// Extra channels to create after connect (network analyzers)
    #[serde(default)]
    pub channels: Vec<String>,
}

impl InstrumentDefinition {
    /// Minimal enabled definition with default timeout
    pub fn new(id: impl Into<String>, driver: DriverKind, resource: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            driver,
            resource: resource.into(),
            timeout_ms: default_timeout_ms(),
            enabled: true,
            init: true,
            channels: Vec::new(),
        }
    }

    /// Exchange timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_name() -> String {
    "rf_daq".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl RfDaqConfig {
    /// Load `config/instruments.toml` with environment overrides
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load a specific file with environment overrides, then validate
    ///
    /// # Errors
    /// `Config` if the file cannot be parsed, `Configuration` if validation
    /// fails. A missing file yields an empty configuration.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Check log level, unique ids, resources and timeouts
    pub fn validate(&self) -> AppResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.application.log_level.as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        let mut ids = HashSet::new();
        for instrument in &self.instruments {
            if instrument.id.trim().is_empty() {
                return Err(DaqError::Configuration(
                    "Instrument id cannot be empty".to_string(),
                ));
            }
            if !ids.insert(instrument.id.as_str()) {
                return Err(DaqError::Configuration(format!(
                    "Duplicate instrument ID: '{}'",
                    instrument.id
                )));
            }
            if instrument.resource.trim().is_empty() {
                return Err(DaqError::Configuration(format!(
                    "Instrument '{}': 'resource' cannot be empty",
                    instrument.id
                )));
            }
            if instrument.timeout_ms == 0 {
                return Err(DaqError::Configuration(format!(
                    "Instrument '{}': 'timeout_ms' must be positive",
                    instrument.id
                )));
            }
            if instrument.driver == DriverKind::Fsv3000 && !instrument.channels.is_empty() {
                return Err(DaqError::Configuration(format!(
                    "Instrument '{}': fsv3000 has no channels",
                    instrument.id
                )));
            }
        }

        Ok(())
    }

    /// Instruments with `enabled = true`
    pub fn enabled_instruments(&self) -> Vec<&InstrumentDefinition> {
        self.instruments.iter().filter(|i| i.enabled).collect()
    }

    /// Look up an instrument by id
    pub fn instrument(&self, id: &str) -> AppResult<&InstrumentDefinition> {
        self.instruments
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| DaqError::Configuration(format!("No instrument with id '{}'", id)))
    }
}
