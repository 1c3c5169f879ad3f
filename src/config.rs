//! Configuration management for the location subsystem
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::LocationError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Adaptive cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Position acquisition and background polling
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Persistent store configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Adaptive cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Interval of the expiry sweep in minutes
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_minutes: u32,
    /// Number of fixes kept per key for movement scoring
    #[serde(default = "default_history_size")]
    pub history_size: u32,
}

/// Position acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Time the provider is given to acquire a fix
    #[serde(default = "default_acquisition_timeout")]
    pub acquisition_timeout_seconds: u32,
    /// Hard limit on a foreground provider call
    #[serde(default = "default_hard_timeout")]
    pub hard_timeout_seconds: u32,
    /// Interval of the background change detector
    #[serde(default = "default_change_detection_interval")]
    pub change_detection_interval_seconds: u32,
    /// Provider timeout used by the change detector
    #[serde(default = "default_change_detection_timeout")]
    pub change_detection_timeout_seconds: u32,
    /// Prompt for permission from the fetch path when it is merely denied
    #[serde(default = "default_true")]
    pub request_permission_on_demand: bool,
    /// Refresh the device location when the sweep finds it expired
    #[serde(default = "default_true")]
    pub proactive_refresh: bool,
}

/// Persistent store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store directory location
    #[serde(default = "default_storage_location")]
    pub location: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_sweep_interval() -> u32 {
    15
}

fn default_history_size() -> u32 {
    10
}

fn default_acquisition_timeout() -> u32 {
    15
}

fn default_hard_timeout() -> u32 {
    20
}

fn default_change_detection_interval() -> u32 {
    60
}

fn default_change_detection_timeout() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_storage_location() -> String {
    dirs::data_local_dir()
        .map(|dir| dir.join("prayer-location").join("store"))
        .unwrap_or_else(|| PathBuf::from("prayer-location-store"))
        .to_string_lossy()
        .into_owned()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_minutes: default_sweep_interval(),
            history_size: default_history_size(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            acquisition_timeout_seconds: default_acquisition_timeout(),
            hard_timeout_seconds: default_hard_timeout(),
            change_detection_interval_seconds: default_change_detection_interval(),
            change_detection_timeout_seconds: default_change_detection_timeout(),
            request_permission_on_demand: true,
            proactive_refresh: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            location: default_storage_location(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.sweep_interval_minutes) * 60)
    }
}

impl AcquisitionConfig {
    #[must_use]
    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.acquisition_timeout_seconds))
    }

    #[must_use]
    pub fn hard_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.hard_timeout_seconds))
    }

    #[must_use]
    pub fn change_detection_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.change_detection_interval_seconds))
    }

    #[must_use]
    pub fn change_detection_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.change_detection_timeout_seconds))
    }
}

impl LocationConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Add environment variable overrides with PRAYER_LOCATION_ prefix,
        // e.g. PRAYER_LOCATION_ACQUISITION__HARD_TIMEOUT_SECONDS=25
        builder = builder.add_source(
            Environment::with_prefix("PRAYER_LOCATION")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: LocationConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("prayer-location").join("config.toml"))
    }

    /// Apply default values to zeroed or empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.cache.sweep_interval_minutes == 0 {
            self.cache.sweep_interval_minutes = default_sweep_interval();
        }
        if self.cache.history_size == 0 {
            self.cache.history_size = default_history_size();
        }
        if self.acquisition.acquisition_timeout_seconds == 0 {
            self.acquisition.acquisition_timeout_seconds = default_acquisition_timeout();
        }
        if self.acquisition.hard_timeout_seconds == 0 {
            self.acquisition.hard_timeout_seconds = default_hard_timeout();
        }
        if self.acquisition.change_detection_interval_seconds == 0 {
            self.acquisition.change_detection_interval_seconds =
                default_change_detection_interval();
        }
        if self.acquisition.change_detection_timeout_seconds == 0 {
            self.acquisition.change_detection_timeout_seconds = default_change_detection_timeout();
        }
        if self.storage.location.is_empty() {
            self.storage.location = default_storage_location();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        let acquisition = &self.acquisition;

        let zero_fields = [
            ("cache.sweep_interval_minutes", self.cache.sweep_interval_minutes),
            ("cache.history_size", self.cache.history_size),
            (
                "acquisition.acquisition_timeout_seconds",
                acquisition.acquisition_timeout_seconds,
            ),
            ("acquisition.hard_timeout_seconds", acquisition.hard_timeout_seconds),
            (
                "acquisition.change_detection_interval_seconds",
                acquisition.change_detection_interval_seconds,
            ),
            (
                "acquisition.change_detection_timeout_seconds",
                acquisition.change_detection_timeout_seconds,
            ),
        ];
        if let Some((name, _)) = zero_fields.iter().find(|(_, value)| *value == 0) {
            return Err(LocationError::config(format!("{name} must be greater than zero")).into());
        }

        if acquisition.hard_timeout_seconds > 120 {
            return Err(LocationError::config("Hard timeout cannot exceed 120 seconds").into());
        }

        if acquisition.hard_timeout_seconds < acquisition.acquisition_timeout_seconds {
            return Err(LocationError::config(
                "Hard timeout cannot be shorter than the acquisition timeout",
            )
            .into());
        }

        if acquisition.change_detection_timeout_seconds > acquisition.hard_timeout_seconds {
            return Err(LocationError::config(
                "Change detection timeout cannot exceed the hard timeout",
            )
            .into());
        }

        if acquisition.change_detection_interval_seconds > 3600 {
            return Err(
                LocationError::config("Change detection interval cannot exceed 1 hour").into(),
            );
        }

        if self.cache.sweep_interval_minutes > 24 * 60 {
            return Err(LocationError::config("Sweep interval cannot exceed 24 hours").into());
        }

        if self.cache.history_size > 100 {
            return Err(LocationError::config("Movement history cannot exceed 100 fixes").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(LocationError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(LocationError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LocationConfig::default();
        assert_eq!(config.cache.sweep_interval_minutes, 15);
        assert_eq!(config.cache.history_size, 10);
        assert_eq!(config.acquisition.acquisition_timeout_seconds, 15);
        assert_eq!(config.acquisition.hard_timeout_seconds, 20);
        assert_eq!(config.acquisition.change_detection_interval_seconds, 60);
        assert_eq!(config.logging.level, "info");
        assert!(config.acquisition.proactive_refresh);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_accessors() {
        let config = LocationConfig::default();
        assert_eq!(config.cache.sweep_interval(), Duration::from_secs(900));
        assert_eq!(config.acquisition.hard_timeout(), Duration::from_secs(20));
        assert_eq!(
            config.acquisition.change_detection_interval(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = LocationConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_timeout_order() {
        let mut config = LocationConfig::default();
        config.acquisition.hard_timeout_seconds = 10;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("shorter than"));
    }

    #[rstest]
    #[case::sweep_interval(|c: &mut LocationConfig| c.cache.sweep_interval_minutes = 0)]
    #[case::history_size(|c: &mut LocationConfig| c.cache.history_size = 0)]
    #[case::acquisition_timeout(|c: &mut LocationConfig| c.acquisition.acquisition_timeout_seconds = 0)]
    #[case::hard_timeout(|c: &mut LocationConfig| c.acquisition.hard_timeout_seconds = 0)]
    #[case::change_interval(|c: &mut LocationConfig| c.acquisition.change_detection_interval_seconds = 0)]
    #[case::change_timeout(|c: &mut LocationConfig| c.acquisition.change_detection_timeout_seconds = 0)]
    fn test_config_validation_rejects_zero(#[case] zero: fn(&mut LocationConfig)) {
        let mut config = LocationConfig::default();
        zero(&mut config);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_apply_defaults_fills_zeroes() {
        let mut config = LocationConfig::default();
        config.cache.history_size = 0;
        config.acquisition.hard_timeout_seconds = 0;
        config.logging.format = String::new();
        config.apply_defaults();
        assert_eq!(config.cache.history_size, 10);
        assert_eq!(config.acquisition.hard_timeout_seconds, 20);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[acquisition]\nhard_timeout_seconds = 25\nproactive_refresh = false\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = LocationConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.acquisition.hard_timeout_seconds, 25);
        assert!(!config.acquisition.proactive_refresh);
        assert_eq!(config.acquisition.acquisition_timeout_seconds, 15);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = LocationConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("prayer-location"));
            assert!(path.to_string_lossy().ends_with("config.toml"));
        }
    }
}
