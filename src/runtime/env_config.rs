//! Environment variable and config file support for engines and the drain
//! service.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`thread_stack_size(..)`)
//! 2. **Environment variables**: values from `TASKHOST_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`EngineConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `TASKHOST_THREAD_NAME_PREFIX` | `String` | `EngineConfig::thread_name_prefix` |
//! | `TASKHOST_THREAD_STACK_SIZE` | `usize` | `EngineConfig::thread_stack_size` |
//! | `TASKHOST_TRACK_OPERATIONS` | `bool` | `EngineConfig::track_operations` |
//! | `TASKHOST_DRAIN_THREAD_NAME` | `String` | `DrainConfig::thread_name` |
//! | `TASKHOST_DRAIN_STACK_SIZE` | `usize` | `DrainConfig::thread_stack_size` |

use crate::error::{Error, ErrorKind};
use crate::runtime::config::{DrainConfig, EngineConfig};

/// Environment variable name for the engine thread name prefix.
pub const ENV_THREAD_NAME_PREFIX: &str = "TASKHOST_THREAD_NAME_PREFIX";
/// Environment variable name for the engine thread stack size.
pub const ENV_THREAD_STACK_SIZE: &str = "TASKHOST_THREAD_STACK_SIZE";
/// Environment variable name for the operation-counter toggle.
pub const ENV_TRACK_OPERATIONS: &str = "TASKHOST_TRACK_OPERATIONS";
/// Environment variable name for the drain thread name.
pub const ENV_DRAIN_THREAD_NAME: &str = "TASKHOST_DRAIN_THREAD_NAME";
/// Environment variable name for the drain thread stack size.
pub const ENV_DRAIN_STACK_SIZE: &str = "TASKHOST_DRAIN_STACK_SIZE";

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable was set but its value could not be parsed.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidValue {
        /// Variable or key name.
        var: &'static str,
        /// Human-readable expected type.
        expected: &'static str,
        /// The offending raw value.
        value: String,
    },
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema.
    #[error("failed to parse TOML config: {0}")]
    Parse(String),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config)
            .with_message(err.to_string())
            .with_source(err)
    }
}

/// Apply environment variable overrides to an [`EngineConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut EngineConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_THREAD_NAME_PREFIX) {
        config.thread_name_prefix = val;
    }
    if let Some(val) = read_env(ENV_THREAD_STACK_SIZE) {
        config.thread_stack_size = parse_usize(ENV_THREAD_STACK_SIZE, &val)?;
    }
    if let Some(val) = read_env(ENV_TRACK_OPERATIONS) {
        config.track_operations = parse_bool(ENV_TRACK_OPERATIONS, &val)?;
    }
    Ok(())
}

/// Apply environment variable overrides to a [`DrainConfig`].
pub fn apply_drain_env_overrides(config: &mut DrainConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_DRAIN_THREAD_NAME) {
        config.thread_name = val;
    }
    if let Some(val) = read_env(ENV_DRAIN_STACK_SIZE) {
        config.thread_stack_size = parse_usize(ENV_DRAIN_STACK_SIZE, &val)?;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue {
            var,
            expected: "unsigned integer",
            value: val.to_string(),
        })
}

fn parse_bool(var: &'static str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            expected: "bool (true/false/1/0/yes/no)",
            value: val.to_string(),
        }),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable configuration.
///
/// ```toml
/// [engine]
/// thread_name_prefix = "myapp-engine"
/// thread_stack_size = 4194304
/// track_operations = true
///
/// [drain]
/// thread_name = "myapp-drain"
/// thread_stack_size = 1048576
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct TaskHostTomlConfig {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineToml,
    /// Drain service settings.
    #[serde(default)]
    pub drain: DrainToml,
}

/// Engine section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct EngineToml {
    /// Name prefix for engine threads.
    pub thread_name_prefix: Option<String>,
    /// Stack size per engine thread in bytes.
    pub thread_stack_size: Option<usize>,
    /// Maintain operation counters.
    pub track_operations: Option<bool>,
}

/// Drain section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct DrainToml {
    /// Name of the drain thread.
    pub thread_name: Option<String>,
    /// Stack size of the drain thread in bytes.
    pub thread_stack_size: Option<usize>,
}

/// Apply the engine section of a parsed TOML config.
///
/// Only fields that are `Some` override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut EngineConfig, toml: &TaskHostTomlConfig) {
    if let Some(ref v) = toml.engine.thread_name_prefix {
        config.thread_name_prefix.clone_from(v);
    }
    if let Some(v) = toml.engine.thread_stack_size {
        config.thread_stack_size = v;
    }
    if let Some(v) = toml.engine.track_operations {
        config.track_operations = v;
    }
}

/// Apply the drain section of a parsed TOML config.
#[cfg(feature = "config-file")]
pub fn apply_drain_toml_config(config: &mut DrainConfig, toml: &TaskHostTomlConfig) {
    if let Some(ref v) = toml.drain.thread_name {
        config.thread_name.clone_from(v);
    }
    if let Some(v) = toml.drain.thread_stack_size {
        config.thread_stack_size = v;
    }
}

/// Parse a TOML string into a [`TaskHostTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<TaskHostTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Read and parse a TOML file into a [`TaskHostTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<TaskHostTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================
