use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_MERGE_WINDOW_SECS: u64 = 3600;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_REMOTE_BACKEND: &str = "in-memory";
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
const DEFAULT_REMOTE_NAMESPACE: &str = "club-inventory";
const DEFAULT_INVENTORY_PATH: &str = "inventory";
const DEFAULT_LOGS_PATH: &str = "logs";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
/// Upper bound for the window and timeout settings: one year.
const MAX_DURATION_SECS: u64 = 31_536_000;

/// Application configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Deployment profile name
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Rolling window in which same-direction changes coalesce into one log entry
    #[serde(default = "default_merge_window_secs")]
    #[validate(range(min = 1, max = 31536000))]
    pub merge_window_secs: u64,

    /// Inactivity after which an editor session is dropped
    #[serde(default = "default_idle_timeout_secs")]
    #[validate(range(min = 1, max = 31536000))]
    pub idle_timeout_secs: u64,

    /// "in-memory" or "redis"
    #[serde(default = "default_remote_backend")]
    #[validate(custom = "validate_remote_backend")]
    pub remote_backend: String,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Key prefix for the remote tree
    #[serde(default = "default_remote_namespace")]
    #[validate(custom = "validate_path_segment")]
    pub remote_namespace: String,

    #[serde(default = "default_inventory_path")]
    #[validate(custom = "validate_path_segment")]
    pub inventory_path: String,

    #[serde(default = "default_logs_path")]
    #[validate(custom = "validate_path_segment")]
    pub logs_path: String,

    /// Directory for the offline copy; in-memory when unset
    #[serde(default)]
    pub local_store_dir: Option<PathBuf>,

    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            merge_window_secs: default_merge_window_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            remote_backend: default_remote_backend(),
            redis_url: default_redis_url(),
            remote_namespace: default_remote_namespace(),
            inventory_path: default_inventory_path(),
            logs_path: default_logs_path(),
            local_store_dir: None,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl AppConfig {
    pub fn merge_window(&self) -> chrono::Duration {
        bounded_seconds(self.merge_window_secs)
    }

    pub fn idle_timeout(&self) -> chrono::Duration {
        bounded_seconds(self.idle_timeout_secs)
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn uses_redis(&self) -> bool {
        self.remote_backend.eq_ignore_ascii_case("redis")
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn bounded_seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

/// Default value functions
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_merge_window_secs() -> u64 {
    DEFAULT_MERGE_WINDOW_SECS
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}

fn default_remote_backend() -> String {
    DEFAULT_REMOTE_BACKEND.to_string()
}

fn default_redis_url() -> String {
    DEFAULT_REDIS_URL.to_string()
}

fn default_remote_namespace() -> String {
    DEFAULT_REMOTE_NAMESPACE.to_string()
}

fn default_inventory_path() -> String {
    DEFAULT_INVENTORY_PATH.to_string()
}

fn default_logs_path() -> String {
    DEFAULT_LOGS_PATH.to_string()
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_remote_backend(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "in-memory" | "redis" => Ok(()),
        _ => {
            let mut err = ValidationError::new("remote_backend");
            err.message = Some("Must be one of: in-memory, redis".into());
            Err(err)
        }
    }
}

/// Remote paths share the key rules of the remote tree.
fn validate_path_segment(value: &str) -> Result<(), ValidationError> {
    if crate::remote::is_valid_key(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("path_segment");
        err.message = Some("Must be non-empty and free of . # $ / [ ]".into());
        Err(err)
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("inventory_sync={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::new(filter_directive);

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("merge_window_secs", DEFAULT_MERGE_WINDOW_SECS as i64)?
        .set_default("idle_timeout_secs", DEFAULT_IDLE_TIMEOUT_SECS as i64)?
        .set_default("remote_backend", DEFAULT_REMOTE_BACKEND)?
        .set_default("redis_url", DEFAULT_REDIS_URL)?
        .set_default("remote_namespace", DEFAULT_REMOTE_NAMESPACE)?
        .set_default("inventory_path", DEFAULT_INVENTORY_PATH)?
        .set_default("logs_path", DEFAULT_LOGS_PATH)?
        .set_default("event_channel_capacity", DEFAULT_EVENT_CHANNEL_CAPACITY as i64)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

#[cfg(test)]
mod config_validation_tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.merge_window(), chrono::Duration::hours(1));
        assert_eq!(cfg.idle_timeout(), chrono::Duration::minutes(10));
        assert!(!cfg.uses_redis());
    }

    #[test]
    fn zero_merge_window_is_rejected() {
        let cfg = AppConfig {
            merge_window_secs: 0,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_durations_are_rejected_without_panicking() {
        let cfg = AppConfig {
            merge_window_secs: u64::MAX,
            idle_timeout_secs: MAX_DURATION_SECS + 1,
            ..AppConfig::default()
        };
        let errors = cfg.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("merge_window_secs"));
        assert!(fields.contains_key("idle_timeout_secs"));

        assert_eq!(cfg.merge_window(), chrono::Duration::seconds(MAX_DURATION_SECS as i64));
        assert_eq!(cfg.idle_timeout(), chrono::Duration::days(365));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let cfg = AppConfig {
            remote_backend: "firestore".into(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn remote_paths_must_be_valid_keys() {
        let cfg = AppConfig {
            logs_path: "logs/archive".into(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_event_capacity_is_rejected() {
        let cfg = AppConfig {
            event_channel_capacity: 0,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
