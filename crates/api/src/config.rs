use serde::Deserialize;
use std::net::SocketAddr;

use domain::models::{GeoPoint, PredictionSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    pub prediction_service: PredictionServiceConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

/// Which zone store implementation backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// How often the postgres snapshot is re-read from the database.
    #[serde(default = "default_snapshot_refresh")]
    pub snapshot_refresh_secs: u64,

    /// How often expired AI zones are swept.
    #[serde(default = "default_expiry_sweep")]
    pub expiry_sweep_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            snapshot_refresh_secs: default_snapshot_refresh(),
            expiry_sweep_secs: default_expiry_sweep(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionServiceConfig {
    /// Base URL of the prediction service, e.g. http://localhost:8000
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_prediction_timeout")]
    pub timeout_secs: u64,
}

/// Startup values for the runtime ML settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub enable_auto_predict: bool,
    pub prediction_radius_meters: f64,
    pub update_interval_minutes: u64,
    pub confidence_threshold: f64,
    pub time_horizon_hours: u32,
    pub flood_prediction_hours: u32,
    pub forecast_days: u32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        let settings = PredictionSettings::default();
        Self {
            enable_auto_predict: settings.enable_auto_predict,
            prediction_radius_meters: settings.prediction_radius_meters,
            update_interval_minutes: settings.update_interval_minutes,
            confidence_threshold: settings.confidence_threshold,
            time_horizon_hours: settings.time_horizon_hours,
            flood_prediction_hours: settings.flood_prediction_hours,
            forecast_days: settings.forecast_days,
        }
    }
}

/// Operator location used until one is reported.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_latitude")]
    pub default_latitude: f64,

    #[serde(default = "default_longitude")]
    pub default_longitude: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            default_latitude: default_latitude(),
            default_longitude: default_longitude(),
        }
    }
}

impl LocationConfig {
    pub fn default_point(&self) -> GeoPoint {
        GeoPoint::new(self.default_latitude, self.default_longitude)
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    60
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_snapshot_refresh() -> u64 {
    30
}
fn default_expiry_sweep() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_prediction_timeout() -> u64 {
    30
}
fn default_latitude() -> f64 {
    28.6139
}
fn default_longitude() -> f64 {
    77.2090
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with RZ__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("RZ").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds the config from embedded defaults and overrides only, so tests
    /// do not depend on the working directory.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            request_timeout_secs = 60

            [database]
            url = ""

            [storage]
            backend = "memory"

            [logging]
            level = "info"
            format = "json"

            [prediction_service]
            base_url = "http://localhost:8000"
            timeout_secs = 30
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.storage.backend == StorageBackend::Postgres && self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "RZ__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.prediction_service.base_url.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "prediction_service.base_url".to_string(),
            ));
        }

        validator::Validate::validate(&self.initial_prediction_settings()).map_err(|e| {
            ConfigValidationError::InvalidValue(format!(
                "prediction: {}",
                domain::services::zone_store::validation_message(&e)
            ))
        })?;

        validator::Validate::validate(&self.location.default_point()).map_err(|e| {
            ConfigValidationError::InvalidValue(format!(
                "location: {}",
                domain::services::zone_store::validation_message(&e)
            ))
        })?;

        Ok(())
    }

    /// Runtime ML settings at startup. The per-request timeout comes from
    /// the prediction service section.
    pub fn initial_prediction_settings(&self) -> PredictionSettings {
        PredictionSettings {
            enable_auto_predict: self.prediction.enable_auto_predict,
            prediction_radius_meters: self.prediction.prediction_radius_meters,
            update_interval_minutes: self.prediction.update_interval_minutes,
            confidence_threshold: self.prediction.confidence_threshold,
            time_horizon_hours: self.prediction.time_horizon_hours,
            flood_prediction_hours: self.prediction.flood_prediction_hours,
            forecast_days: self.prediction.forecast_days,
            request_timeout_secs: self.prediction_service.timeout_secs,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load_with_defaults() {
        let config = Config::load_for_test(&[]).expect("Failed to load config");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.prediction_service.timeout_secs, 30);
        assert_eq!(
            config.initial_prediction_settings(),
            PredictionSettings::default()
        );
        assert_eq!(config.location.default_latitude, 28.6139);
        assert_eq!(config.location.default_longitude, 77.2090);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_override() {
        let config = Config::load_for_test(&[
            ("server.port", "9000"),
            ("logging.level", "debug"),
            ("prediction.confidence_threshold", "0.8"),
        ])
        .expect("Failed to load config");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.prediction.confidence_threshold, 0.8);
        assert_eq!(config.prediction.update_interval_minutes, 30);
    }

    #[test]
    fn test_config_validation_missing_db_url_for_postgres() {
        let config =
            Config::load_for_test(&[("storage.backend", "postgres")]).expect("Failed to load config");
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("RZ__DATABASE__URL"));
    }

    #[test]
    fn test_config_validation_invalid_pool_settings() {
        let config = Config::load_for_test(&[
            ("database.min_connections", "100"),
            ("database.max_connections", "10"),
        ])
        .expect("Failed to load config");

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("min_connections"));
    }

    #[test]
    fn test_config_validation_rejects_bad_prediction_settings() {
        let config = Config::load_for_test(&[("prediction.confidence_threshold", "1.5")])
            .expect("Failed to load config");
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("prediction"));
        assert!(err.contains("confidence_threshold"));
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::load_for_test(&[("server.host", "127.0.0.1"), ("server.port", "3000")])
            .expect("Failed to load config");

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }
}
