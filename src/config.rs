//! Configuration management with validation and defaults
//!
//! Values are loaded from an optional TOML file, then overridden by
//! `LUCKYBET_*` environment variables, then validated. Monetary values are
//! in minor units (cents); multipliers are in basis points.

use crate::errors::{ConfigurationError, LuckyBetResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Complete service configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LuckyBetConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub round: RoundConfig,
    pub ledger: LedgerConfig,
    pub monitoring: MonitoringConfig,
}

/// HTTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Key expected in `X-API-Key` for admin endpoints; admin is closed when unset
    pub admin_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            admin_api_key: None,
        }
    }
}

/// Storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_directory: String,
    pub write_buffer_size_mb: usize,
    /// Whether to clear database on startup (testing only!)
    pub clear_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/ledger_data".to_string(),
            write_buffer_size_mb: 64,
            clear_on_start: false,
        }
    }
}

/// Continuous multiplier round configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// How often the scheduler tries to arm a new round
    pub arm_interval_ms: u64,
    /// Time between multiplier increments
    pub tick_interval_ms: u64,
    pub increment_bps: u32,
    /// Crash point is drawn uniformly from `[crash_min_bps, crash_max_bps)`
    pub crash_min_bps: u32,
    pub crash_max_bps: u32,
    pub min_bet: i64,
    pub max_bet: i64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            arm_interval_ms: 30_000,
            tick_interval_ms: 1_000,
            increment_bps: 1_000,
            crash_min_bps: 10_000,
            crash_max_bps: 1_010_000,
            min_bet: 100,
            max_bet: 1_000_000,
        }
    }
}

/// Ledger policy configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub referral_commission_bps: u32,
    pub min_deposit: i64,
    pub min_withdrawal: i64,
    pub default_demo_balance: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            referral_commission_bps: 500,
            min_deposit: 1_000,
            min_withdrawal: 2_000,
            default_demo_balance: 500_000,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_filter: "luckybet=info,tower_http=info".to_string(),
        }
    }
}

impl LuckyBetConfig {
    /// Configuration for tests: fast rounds, throwaway database
    pub fn testing(data_directory: &str) -> Self {
        Self {
            storage: StorageConfig {
                data_directory: data_directory.to_string(),
                clear_on_start: true,
                ..Default::default()
            },
            round: RoundConfig {
                arm_interval_ms: 50,
                tick_interval_ms: 10,
                ..Default::default()
            },
            server: ServerConfig {
                admin_api_key: Some("test-admin-key".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.round.tick_interval_ms == 0 || self.round.arm_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "round intervals must be > 0".to_string(),
            ));
        }

        if self.round.increment_bps == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "round.increment_bps must be > 0".to_string(),
            ));
        }

        if self.round.crash_min_bps < 10_000 || self.round.crash_max_bps <= self.round.crash_min_bps {
            return Err(ConfigValidationError::LogicalInconsistency(
                "crash range must start at 1.00x or above and be non-empty".to_string(),
            ));
        }

        if self.round.min_bet <= 0 || self.round.max_bet < self.round.min_bet {
            return Err(ConfigValidationError::LogicalInconsistency(
                "round bet bounds must satisfy 0 < min_bet <= max_bet".to_string(),
            ));
        }

        if self.ledger.referral_commission_bps > 10_000 {
            return Err(ConfigValidationError::InvalidValue(
                "referral_commission_bps cannot exceed 10000".to_string(),
            ));
        }

        if self.ledger.min_deposit <= 0 || self.ledger.min_withdrawal <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "deposit and withdrawal minimums must be > 0".to_string(),
            ));
        }

        if self.ledger.default_demo_balance < 0 {
            return Err(ConfigValidationError::InvalidValue(
                "default_demo_balance cannot be negative".to_string(),
            ));
        }

        if self.server.admin_api_key.as_deref() == Some("") {
            return Err(ConfigValidationError::InvalidValue(
                "admin_api_key cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn arm_interval(&self) -> Duration {
        Duration::from_millis(self.round.arm_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.round.tick_interval_ms)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    InvalidValue(String),
    LogicalInconsistency(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValidationError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
            ConfigValidationError::LogicalInconsistency(msg) => write!(f, "Configuration logical inconsistency: {}", msg),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> LuckyBetResult<LuckyBetConfig> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => LuckyBetConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;

        config
            .validate()
            .map_err(|e| ConfigurationError::ValidationFailed(e.to_string()))?;

        Ok(config)
    }

    /// Parse a TOML document into a configuration (no env overrides)
    pub fn parse(content: &str) -> LuckyBetResult<LuckyBetConfig> {
        toml::from_str(content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn load_from_file(path: &str) -> LuckyBetResult<LuckyBetConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;
        Self::parse(&content)
    }

    fn apply_env_overrides(config: &mut LuckyBetConfig) -> LuckyBetResult<()> {
        if let Ok(host) = env::var("LUCKYBET_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("LUCKYBET_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigurationError::InvalidValue {
                field: "LUCKYBET_PORT".to_string(),
                value: port,
                reason: "Invalid port number".to_string(),
            })?;
        }
        if let Ok(path) = env::var("LUCKYBET_DB_PATH") {
            config.storage.data_directory = path;
        }
        if let Ok(key) = env::var("LUCKYBET_ADMIN_API_KEY") {
            config.server.admin_api_key = Some(key);
        }
        if let Ok(bps) = env::var("LUCKYBET_REFERRAL_BPS") {
            config.ledger.referral_commission_bps =
                bps.parse().map_err(|_| ConfigurationError::InvalidValue {
                    field: "LUCKYBET_REFERRAL_BPS".to_string(),
                    value: bps,
                    reason: "Expected basis points as an integer".to_string(),
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LuckyBetConfig::default().validate().is_ok());
    }

    #[test]
    fn test_testing_config_is_valid() {
        assert!(LuckyBetConfig::testing("./DB/test").validate().is_ok());
    }

    #[test]
    fn test_invalid_crash_range() {
        let mut config = LuckyBetConfig::default();
        config.round.crash_max_bps = config.round.crash_min_bps;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_commission_above_hundred_percent_rejected() {
        let mut config = LuckyBetConfig::default();
        config.ledger.referral_commission_bps = 10_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ConfigLoader::parse(
            r#"
            [server]
            port = 9000
            admin_api_key = "secret"

            [round]
            tick_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.admin_api_key.as_deref(), Some("secret"));
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.round.arm_interval_ms, 30_000);
        assert_eq!(config.ledger.referral_commission_bps, 500);
    }

    #[test]
    fn test_malformed_toml_is_load_error() {
        assert!(ConfigLoader::parse("[server\nport = ").is_err());
    }
}
