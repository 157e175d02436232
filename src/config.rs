use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::services::allocator::BorrowPolicy;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY_SYMBOL: &str = "₹";
const DEFAULT_PLACEHOLDER: &str = "—";
const MAX_SUBMISSION_CONCURRENCY: usize = 32;

/// Engine configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// How borrowed quantity is attributed to donor categories
    #[serde(default)]
    pub borrow_policy: BorrowPolicy,

    /// Line writes in flight during submission; 1 submits sequentially
    #[serde(default = "default_submission_concurrency")]
    #[validate(custom = "validate_submission_concurrency")]
    pub submission_concurrency: usize,

    #[serde(default = "default_currency_symbol")]
    #[validate(length(min = 1))]
    pub currency_symbol: String,

    /// Text shown for missing descriptive fields
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Extra keyword → category label rules, checked before the built-in table
    #[serde(default)]
    pub category_keywords: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENV.to_string(),
            log_level: default_log_level(),
            log_json: false,
            borrow_policy: BorrowPolicy::default(),
            submission_concurrency: default_submission_concurrency(),
            currency_symbol: default_currency_symbol(),
            placeholder: default_placeholder(),
            category_keywords: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Error type for configuration loading
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_submission_concurrency() -> usize {
    1
}

fn default_currency_symbol() -> String {
    DEFAULT_CURRENCY_SYMBOL.to_string()
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
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

fn validate_submission_concurrency(value: usize) -> Result<(), ValidationError> {
    if value == 0 || value > MAX_SUBMISSION_CONCURRENCY {
        let mut err = ValidationError::new("submission_concurrency");
        err.message = Some(
            format!(
                "submission_concurrency must be between 1 and {}",
                MAX_SUBMISSION_CONCURRENCY
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("dispatch_engine={},dispatch_cli={}", level, level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads engine configuration from `config/` in the working directory.
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<EngineConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit configuration directory.
pub fn load_config_from(config_dir: &Path) -> Result<EngineConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let engine_config: EngineConfig = config.try_deserialize()?;

    engine_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(engine_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_dir(content: &str) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("default.toml"), content).unwrap();
        temp_dir
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.submission_concurrency, 1);
        assert_eq!(config.currency_symbol, "₹");
        assert_eq!(config.borrow_policy, BorrowPolicy::SmallestSufficientFirst);
    }

    #[test]
    fn test_load_from_file() {
        let dir = config_dir(
            r#"
            log_level = "debug"
            borrow_policy = "declared_order"
            submission_concurrency = 4

            [category_keywords]
            vanaspati = "Palm"
            "#,
        );

        let config = load_config_from(dir.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.borrow_policy, BorrowPolicy::DeclaredOrder);
        assert_eq!(config.submission_concurrency, 4);
        assert_eq!(
            config.category_keywords.get("vanaspati").map(String::as_str),
            Some("Palm")
        );
        assert_eq!(config.placeholder, "—");
    }

    #[test]
    fn test_missing_directory_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from(&dir.path().join("absent")).unwrap();
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
    }

    #[test]
    fn test_validation_failure() {
        let dir = config_dir(
            r#"
            log_level = "loud"
            submission_concurrency = 0
            "#,
        );

        let result = load_config_from(dir.path());
        assert!(matches!(result, Err(AppConfigError::Validation(_))));

        if let Err(AppConfigError::Validation(errors)) = result {
            assert!(errors.field_errors().contains_key("log_level"));
            assert!(errors.field_errors().contains_key("submission_concurrency"));
        }
    }

    #[test]
    fn test_concurrency_upper_bound() {
        assert!(validate_submission_concurrency(32).is_ok());
        assert!(validate_submission_concurrency(33).is_err());
    }

    #[test]
    fn test_production_flag() {
        let config = EngineConfig {
            environment: "Production".into(),
            ..EngineConfig::default()
        };
        assert!(config.is_production());
    }
}
