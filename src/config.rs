use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::auth::{DefaultAdmin, PasswordPolicy};
use crate::errors::ServiceError;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_DATA_DIR: &str = ".";
const DEFAULT_BACKUP_DIR: &str = "backups";
const DEFAULT_MIN_PASSWORD_LENGTH: i64 = 4;
const DEFAULT_ADMIN: &str = "admin";
const CONFIG_DIR: &str = "config";

/// Application configuration
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Directory holding the entity record files
    pub data_dir: PathBuf,

    /// Root of timestamped backups; relative paths resolve against `data_dir`
    pub backup_dir: PathBuf,

    /// Active profile name
    pub environment: String,

    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Emit log lines as JSON
    pub log_json: bool,

    #[validate(range(min = 1, max = 128))]
    pub min_password_length: usize,

    #[validate(length(min = 1))]
    pub default_admin_username: String,

    #[validate(length(min = 1))]
    pub default_admin_password: String,
}

impl AppConfig {
    /// Built-in defaults rooted at `data_dir`, without reading any file or
    /// environment variable.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            environment: DEFAULT_ENV.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH as usize,
            default_admin_username: DEFAULT_ADMIN.to_string(),
            default_admin_password: DEFAULT_ADMIN.to_string(),
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        if self.backup_dir.is_absolute() {
            self.backup_dir.clone()
        } else {
            self.data_dir.join(&self.backup_dir)
        }
    }

    pub fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy::new(self.min_password_length)
    }

    pub fn default_admin(&self) -> DefaultAdmin {
        DefaultAdmin {
            username: self.default_admin_username.clone(),
            password: self.default_admin_password.clone(),
        }
    }
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

/// Initializes tracing using the provided log level as the default filter.
/// Output goes to stderr so command output on stdout stays parseable.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("shop_manager={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let builder = fmt()
        .with_env_filter(EnvFilter::new(filter_directive))
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, ServiceError> {
    load_config_from(Path::new(CONFIG_DIR))
}

pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, ServiceError> {
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
        .set_default("data_dir", DEFAULT_DATA_DIR)?
        .set_default("backup_dir", DEFAULT_BACKUP_DIR)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("min_password_length", DEFAULT_MIN_PASSWORD_LENGTH)?
        .set_default("default_admin_username", DEFAULT_ADMIN)?
        .set_default("default_admin_password", DEFAULT_ADMIN)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        ServiceError::from(e)
    })?;

    info!(data_dir = %app_config.data_dir.display(), "Configuration loaded successfully");
    Ok(app_config)
}
