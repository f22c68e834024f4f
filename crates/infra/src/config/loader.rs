//! Configuration loader
//!
//! ## Loading Strategy
//! 1. If any `DATEBOOK_*` variable is set, the environment wins: defaults
//!    overlaid with the variables that are present
//! 2. Otherwise the first config file found by [`probe_config_paths`]
//! 3. Otherwise built-in defaults
//!
//! Whatever the source, the result goes through [`Config::validate`].
//!
//! ## Environment Variables
//! - `DATEBOOK_MIN_BATCH_SECS`: quiet period before a rebuild
//! - `DATEBOOK_MAX_BATCH_SECS`: longest a rebuild may be postponed
//! - `DATEBOOK_UPCOMING_DAYS`: planner look-ahead in days
//! - `DATEBOOK_MAX_UPCOMING`: planner upcoming list length
//! - `DATEBOOK_TIMEZONE`: query zone (empty means the system zone)
//! - `DATEBOOK_LOG_FILTER`: default tracing filter directive
//! - `DATEBOOK_LOG_JSON`: JSON log output (true/false)
//!
//! ## File Locations
//! `config.{toml,json}` and `datebook.{toml,json}` in the working
//! directory, then `config.{toml,json}` in its parent and grandparent, then
//! the same names next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use datebook_domain::{Config, DatebookError, Result};

const ENV_MIN_BATCH: &str = "DATEBOOK_MIN_BATCH_SECS";
const ENV_MAX_BATCH: &str = "DATEBOOK_MAX_BATCH_SECS";
const ENV_UPCOMING_DAYS: &str = "DATEBOOK_UPCOMING_DAYS";
const ENV_MAX_UPCOMING: &str = "DATEBOOK_MAX_UPCOMING";
const ENV_TIMEZONE: &str = "DATEBOOK_TIMEZONE";
const ENV_LOG_FILTER: &str = "DATEBOOK_LOG_FILTER";
const ENV_LOG_JSON: &str = "DATEBOOK_LOG_JSON";

const ENV_KEYS: &[&str] = &[
    ENV_MIN_BATCH,
    ENV_MAX_BATCH,
    ENV_UPCOMING_DAYS,
    ENV_MAX_UPCOMING,
    ENV_TIMEZONE,
    ENV_LOG_FILTER,
    ENV_LOG_JSON,
];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `DatebookError::Config` if a variable or file is malformed or
/// the resulting configuration fails validation.
pub fn load() -> Result<Config> {
    if ENV_KEYS.iter().any(|key| std::env::var_os(key).is_some()) {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::debug!("No config file found, using defaults");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Defaults overlaid with whichever `DATEBOOK_*` variables are set.
///
/// # Errors
/// Returns `DatebookError::Config` for unparsable values or an invalid
/// result.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    if let Some(value) = env_parse(ENV_MIN_BATCH)? {
        config.batch.min_seconds = value;
    }
    if let Some(value) = env_parse(ENV_MAX_BATCH)? {
        config.batch.max_seconds = value;
    }
    if let Some(value) = env_parse(ENV_UPCOMING_DAYS)? {
        config.planner.upcoming_days = value;
    }
    if let Some(value) = env_parse(ENV_MAX_UPCOMING)? {
        config.planner.max_upcoming = value;
    }
    if let Ok(zone) = std::env::var(ENV_TIMEZONE) {
        config.planner.timezone = Some(zone).filter(|zone| !zone.trim().is_empty());
    }
    if let Ok(filter) = std::env::var(ENV_LOG_FILTER) {
        config.logging.filter = filter;
    }
    config.logging.json = env_bool(ENV_LOG_JSON, config.logging.json);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected
/// by extension (`.toml` or `.json`); missing sections take defaults.
///
/// # Errors
/// Returns `DatebookError::Config` if the file is missing, unreadable,
/// malformed or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DatebookError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            DatebookError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| DatebookError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DatebookError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DatebookError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(DatebookError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.is_file())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.toml"),
        dir.join("config.json"),
        dir.join("datebook.toml"),
        dir.join("datebook.json"),
        dir.join("../config.toml"),
        dir.join("../config.json"),
        dir.join("../../config.toml"),
        dir.join("../../config.json"),
    ]
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| DatebookError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
/// (case-insensitive); anything else counts as false.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
