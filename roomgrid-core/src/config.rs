use config::{Config as ConfigBuilder, Environment, File};

use crate::error::Result;
use crate::suppression::MAX_SUPPRESSION_TTL;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub grid: GridConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Participant grid behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// How long a removed participant stays hidden without roster confirmation
    pub suppression_ttl_ms: u64,
    /// Maximum number of pinned participants
    pub max_pinned: usize,
    /// Buffer size of the session event channel
    pub event_capacity: usize,
    /// Extra `<prefix>_<userId>` keys tried for hosts, after the built-in ones
    pub extra_role_prefixes: Vec<String>,
    /// Extra substrings that mark a registry key as belonging to a host
    pub extra_role_hints: Vec<String>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            suppression_ttl_ms: 5_000,
            max_pinned: 4,
            event_capacity: 256,
            extra_role_prefixes: Vec::new(),
            extra_role_hints: Vec::new(),
        }
    }
}

impl GridConfig {
    #[must_use]
    pub const fn suppression_ttl(&self) -> Duration {
        Duration::from_millis(self.suppression_ttl_ms)
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // ROOMGRID_GRID__MAX_PINNED, ROOMGRID_LOGGING__LEVEL, ...
        builder = builder.add_source(
            Environment::with_prefix("ROOMGRID")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Check values that deserialize fine but make no sense at runtime
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.grid.max_pinned == 0 {
            errors.push("grid.max_pinned must be at least 1".to_string());
        }
        if self.grid.suppression_ttl_ms == 0 {
            errors.push("grid.suppression_ttl_ms must be greater than 0".to_string());
        } else if self.grid.suppression_ttl() > MAX_SUPPRESSION_TTL {
            errors.push(format!(
                "grid.suppression_ttl_ms must be at most {}, got {}",
                MAX_SUPPRESSION_TTL.as_millis(),
                self.grid.suppression_ttl_ms
            ));
        }
        if self.grid.event_capacity == 0 {
            errors.push("grid.event_capacity must be greater than 0".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
