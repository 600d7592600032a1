//! Configuration loading and validation.

use crate::types::ProcError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchPolicy,
    #[serde(default)]
    pub terminate: TerminateConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchPolicy::default(),
            terminate: TerminateConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// How table fetches react to tables that grow between probe and fetch.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Fetch attempts per table, including the first. `1` accepts no regrowth.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Process-id slots offered on the first process-table fetch.
    #[serde(default = "default_initial_process_capacity")]
    pub initial_process_capacity: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            initial_process_capacity: default_initial_process_capacity(),
        }
    }
}

impl FetchPolicy {
    /// Backoff before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TerminateConfig {
    /// Exit code handed to the platform for forcibly terminated processes.
    #[serde(default = "default_exit_code")]
    pub exit_code: u32,
}

impl Default for TerminateConfig {
    fn default() -> Self {
        Self {
            exit_code: default_exit_code(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    5
}

fn default_initial_process_capacity() -> usize {
    1024
}

fn default_exit_code() -> u32 {
    127
}

impl Config {
    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProcError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ProcError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ProcError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ProcError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProcError> {
        if self.fetch.max_attempts == 0 {
            return Err(ProcError::Config(
                "fetch.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.fetch.initial_process_capacity == 0 {
            return Err(ProcError::Config(
                "fetch.initial_process_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
