//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_UPCOMING, DEFAULT_UPCOMING_DAYS, MAX_BATCH_SECONDS, MIN_BATCH_SECONDS,
};
use crate::errors::{DatebookError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub batch: BatchConfig,
    pub planner: PlannerConfig,
    pub logging: LoggingConfig,
}

/// Bounds for coalescing change notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Quiet period that must elapse after the last change.
    pub min_seconds: u64,
    /// Upper bound on the delay after the first change of a burst.
    pub max_seconds: u64,
}

/// Planner windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub upcoming_days: u32,
    pub max_upcoming: usize,
    /// Zone used for queries. `None` or empty means the system zone.
    pub timezone: Option<String>,
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
    pub json: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { min_seconds: MIN_BATCH_SECONDS, max_seconds: MAX_BATCH_SECONDS }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            upcoming_days: DEFAULT_UPCOMING_DAYS,
            max_upcoming: DEFAULT_MAX_UPCOMING,
            timezone: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), json: false }
    }
}

impl Config {
    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `DatebookError::Config` when the batch bounds are inverted or
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.batch.min_seconds == 0 {
            return Err(DatebookError::Config("batch.min_seconds must be positive".into()));
        }
        if self.batch.min_seconds > self.batch.max_seconds {
            return Err(DatebookError::Config(format!(
                "batch.min_seconds ({}) exceeds batch.max_seconds ({})",
                self.batch.min_seconds, self.batch.max_seconds
            )));
        }
        if self.planner.upcoming_days == 0 {
            return Err(DatebookError::Config("planner.upcoming_days must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.batch.min_seconds, 1);
        assert_eq!(config.batch.max_seconds, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_batch_bounds_are_rejected() {
        let mut config = Config::default();
        config.batch.min_seconds = 90;
        assert!(matches!(config.validate(), Err(DatebookError::Config(_))));
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config: Config = serde_json::from_str(r#"{"batch":{"max_seconds":30}}"#).unwrap();
        assert_eq!(config.batch.min_seconds, 1);
        assert_eq!(config.batch.max_seconds, 30);
        assert_eq!(config.planner.upcoming_days, 7);
        assert_eq!(config.logging.filter, "info");
    }
}
