//! fragsrc configuration
//!
//! TOML-based configuration with sensible defaults - a minimal config
//! needs only the ring address and one of the two source-id paths.
//!
//! # Example Minimal Config
//!
//! ```toml
//! [source]
//! ring = "tcp://daq-host:30000"
//!
//! [assembly]
//! ids = [1, 2]
//!
//! [extractor]
//! type = "payload-word"
//! ```
//!
//! Setups where every record carries a body header need neither ids nor an
//! extractor - `expect_body_headers = true` alone is enough.
//!
//! # Example Full Config
//!
//! See `configs/example.toml` for all available options.

mod error;
mod logging;
mod validation;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};

/// Default packed-buffer budget per drain pass (10 MiB)
const DEFAULT_BATCH_BUDGET: usize = 10 * 1024 * 1024;

/// Main configuration structure
///
/// Every section is optional in TOML; validation decides what is actually
/// required for the selected mode.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ring attachment and polling
    pub source: SourceConfig,

    /// Record-to-fragment assembly policy
    pub assembly: AssemblyConfig,

    /// Timestamp extractor selection
    pub extractor: ExtractorConfig,

    /// One-shot end-of-run termination
    pub oneshot: OneshotConfig,

    /// Pass-through relay mode
    pub relay: RelayConfig,

    /// Logging
    pub log: LogConfig,
}

/// Ring attachment configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Ring address, e.g. `tcp://daq-host:30000` (required)
    pub ring: String,

    /// Maximum time one ring poll may wait, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ring: String::new(),
            poll_interval_ms: 100,
        }
    }
}

/// Assembly policy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Allowed source ids; fragments from other sources are dropped
    pub ids: Vec<u32>,

    /// Every record is expected to carry a body header
    pub expect_body_headers: bool,

    /// Source id for records without a body header
    /// (defaults to the first entry of `ids`)
    pub default_id: Option<u32>,

    /// Signed tick adjustment added to every resolved timestamp
    pub tick_offset: i64,

    /// Packed-buffer byte budget per drain pass
    pub batch_budget: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            expect_body_headers: false,
            default_id: None,
            tick_offset: 0,
            batch_budget: DEFAULT_BATCH_BUDGET,
        }
    }
}

/// Timestamp extractor configuration
///
/// # Example
///
/// ```toml
/// [extractor]
/// type = "payload-word"
/// offset = 8
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Registered extractor name
    #[serde(rename = "type")]
    pub name: Option<String>,

    /// Free-form parameters handed to the extractor factory
    #[serde(flatten)]
    pub params: HashMap<String, toml::Value>,
}

/// One-shot termination configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OneshotConfig {
    /// Number of sources whose end-of-run must be seen (0 = run forever)
    pub sources: u32,

    /// Cumulative idle seconds tolerated after the first end-of-run
    pub timeout_secs: u64,
}

impl Default for OneshotConfig {
    fn default() -> Self {
        Self {
            sources: 0,
            timeout_secs: 20,
        }
    }
}

/// Relay mode configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bounded queue capacity between the ring side and the output side
    pub queue_capacity: usize,

    /// Drop records on a full queue instead of exerting backpressure
    pub non_blocking: bool,

    /// Exit after writing an end-of-run record
    pub exit_on_end: bool,

    /// Output sink: `stdout` or `tcp://host:port`
    pub output: String,

    /// Source id framed for records without a body header
    pub default_id: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            non_blocking: false,
            exit_on_end: false,
            output: "stdout".into(),
            default_id: 0,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without cross-field validation
    ///
    /// For callers that merge command-line overrides on top of the file and
    /// validate the merged result; everyone else wants [`Config::from_file`].
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Validate only the sections relay mode uses
    pub fn validate_relay_mode(&self) -> Result<()> {
        validation::validate_relay_mode(self)
    }

    /// The effective default source id: configured, or first of `ids`
    pub fn resolved_default_id(&self) -> Option<u32> {
        self.assembly
            .default_id
            .or_else(|| self.assembly.ids.first().copied())
    }

    /// Is one-shot mode active?
    pub fn oneshot_enabled(&self) -> bool {
        self.oneshot.sources > 0
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
