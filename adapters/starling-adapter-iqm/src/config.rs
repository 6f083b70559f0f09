//! Configuration for the IQM adapter.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with `STARLING_` prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use starling_compile::{ExistingMoveHandling, MoveValidationMode};

use crate::backend::DEFAULT_SHOTS;
use crate::wire::HeraldingMode;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "STARLING_";

/// Adapter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IqmConfig {
    /// Default number of shots
    #[serde(default = "default_shots")]
    pub shots: u32,

    /// Calibration set to run against; the service default if absent
    #[serde(default)]
    pub calibration_set_id: Option<Uuid>,

    /// What transpilation does with MOVEs already in the input
    #[serde(default)]
    pub existing_moves: ExistingMoveHandling,

    /// Serialize instructions without a native counterpart as-is
    #[serde(default)]
    pub allow_passthrough: bool,

    /// How strictly MOVE sandwiches are validated
    #[serde(default)]
    pub validation_mode: MoveValidationMode,

    /// Heralding applied before each shot
    #[serde(default)]
    pub heralding_mode: HeraldingMode,

    /// Reject circuits longer than this multiple of the shortest T2
    #[serde(default)]
    pub max_circuit_duration_over_t2: Option<f64>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "console" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_shots() -> u32 {
    DEFAULT_SHOTS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for IqmConfig {
    fn default() -> Self {
        Self {
            shots: default_shots(),
            calibration_set_id: None,
            existing_moves: ExistingMoveHandling::default(),
            allow_passthrough: false,
            validation_mode: MoveValidationMode::default(),
            heralding_mode: HeraldingMode::default(),
            max_circuit_duration_over_t2: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Parse an enum value the way it is spelled in YAML.
fn parse_enum<T: DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
}

fn apply<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
    mut set: impl FnMut(T),
) {
    let var = format!("{ENV_PREFIX}{name}");
    if let Some(raw) = lookup(&var) {
        match parse(raw.trim()) {
            Some(value) => set(value),
            None => warn!("Ignoring {}: cannot parse '{}'", var, raw),
        }
    }
}

impl IqmConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: IqmConfig = serde_yaml_ng::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Environment variables
    /// 2. The file at `config_file`, if given
    /// 3. Defaults
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => IqmConfig::default(),
        };
        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn merge_env(self) -> Self {
        self.merge_env_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    ///
    /// Only variables that are set override the current values. Values that
    /// do not parse are logged and ignored.
    pub fn merge_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        apply(&lookup, "SHOTS", |v| v.parse().ok(), |v| self.shots = v);
        apply(
            &lookup,
            "CALIBRATION_SET_ID",
            |v| Uuid::parse_str(v).ok(),
            |v| self.calibration_set_id = Some(v),
        );
        apply(&lookup, "EXISTING_MOVES", parse_enum, |v| self.existing_moves = v);
        apply(&lookup, "ALLOW_PASSTHROUGH", |v| v.parse().ok(), |v| {
            self.allow_passthrough = v;
        });
        apply(&lookup, "VALIDATION_MODE", parse_enum, |v| self.validation_mode = v);
        apply(&lookup, "HERALDING_MODE", parse_enum, |v| self.heralding_mode = v);
        apply(
            &lookup,
            "MAX_CIRCUIT_DURATION_OVER_T2",
            |v| v.parse().ok(),
            |v| self.max_circuit_duration_over_t2 = Some(v),
        );
        apply(&lookup, "LOG_LEVEL", |v| Some(v.to_string()), |v| self.logging.level = v);
        apply(&lookup, "LOG_FORMAT", |v| Some(v.to_string()), |v| self.logging.format = v);
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shots == 0 {
            return Err(ConfigError::ValidationError("shots must be greater than 0".to_string()));
        }

        if let Some(ratio) = self.max_circuit_duration_over_t2 {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "max_circuit_duration_over_t2 must be positive, got {ratio}"
                )));
            }
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!("Invalid log level: {other}")));
            }
        }

        match self.logging.format.as_str() {
            "console" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!("Invalid log format: {other}")));
            }
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
