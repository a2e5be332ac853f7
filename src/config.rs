//! Configuration management for `EnergyDSS`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::DssError;
use crate::models::{Coordinate, RegionBounds};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for `EnergyDSS`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DssConfig {
    /// Geodata backend configuration
    #[serde(default)]
    pub backend: BackendConfig,
    /// Analysis policy settings
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Geodata backend configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the primary geodata backend
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,
    /// Optional secondary backend used as fallback for metric slots
    #[serde(default)]
    pub secondary_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_seconds: u32,
}

/// Analysis policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Slope above which a site is flagged unsuitable, in degrees
    #[serde(default = "default_slope_limit")]
    pub slope_limit_deg: f64,
    /// Area in which device locations are trusted
    #[serde(default = "default_mission_area")]
    pub mission_area: RegionBounds,
    /// Substitute coordinate for devices outside the mission area
    #[serde(default = "default_simulation_point")]
    pub simulation_point: Coordinate,
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

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_port")]
    pub port: u16,
}

// Default value functions
fn default_backend_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_backend_timeout() -> u32 {
    15
}

fn default_slope_limit() -> f64 {
    15.0
}

fn default_mission_area() -> RegionBounds {
    RegionBounds {
        min_latitude: -2.0,
        max_latitude: 12.0,
        min_longitude: 40.5,
        max_longitude: 51.5,
    }
}

fn default_simulation_point() -> Coordinate {
    // Mogadishu
    Coordinate::new_unchecked(2.0469, 45.3182)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            secondary_url: None,
            timeout_seconds: default_backend_timeout(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            slope_limit_deg: default_slope_limit(),
            mission_area: default_mission_area(),
            simulation_point: default_simulation_point(),
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

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
        }
    }
}

impl Default for DssConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            analysis: AnalysisConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl DssConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
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

        // Environment overrides, e.g. ENERGYDSS__BACKEND__BASE_URL
        builder = builder.add_source(
            Environment::with_prefix("ENERGYDSS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: DssConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("energydss").join("config.toml"))
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.backend.base_url.is_empty() {
            self.backend.base_url = default_backend_base_url();
        }
        if self.backend.timeout_seconds == 0 {
            self.backend.timeout_seconds = default_backend_timeout();
        }
        if self
            .backend
            .secondary_url
            .as_ref()
            .is_some_and(|url| url.trim().is_empty())
        {
            self.backend.secondary_url = None;
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.server.port == 0 {
            self.server.port = default_server_port();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_analysis_area()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.backend.timeout_seconds > 300 {
            return Err(DssError::config("Backend timeout cannot exceed 300 seconds").into());
        }

        if !(0.0..=90.0).contains(&self.analysis.slope_limit_deg) {
            return Err(
                DssError::config("Slope limit must be between 0 and 90 degrees").into(),
            );
        }

        Ok(())
    }

    /// Validate mission area and simulation point
    fn validate_analysis_area(&self) -> Result<()> {
        self.analysis
            .mission_area
            .validate()
            .map_err(|e| DssError::config(format!("Invalid mission area: {e}")))?;

        if !self
            .analysis
            .mission_area
            .contains(&self.analysis.simulation_point)
        {
            return Err(DssError::config(
                "Simulation point must lie inside the mission area",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(DssError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(DssError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = std::iter::once(&self.backend.base_url).chain(&self.backend.secondary_url);
        for url in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DssError::config(format!(
                    "Backend URL '{url}' must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DssConfig::default();
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.backend.timeout_seconds, 15);
        assert!(config.backend.secondary_url.is_none());
        assert_eq!(config.analysis.slope_limit_deg, 15.0);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = DssConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = DssConfig::default();
        config.backend.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn test_config_validation_simulation_point_outside_area() {
        let mut config = DssConfig::default();
        config.analysis.simulation_point = Coordinate::new(52.52, 13.40).unwrap();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Simulation point"));
    }

    #[test]
    fn test_config_validation_inverted_mission_area() {
        let mut config = DssConfig::default();
        config.analysis.mission_area.min_latitude = 20.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_secondary_url() {
        let mut config = DssConfig::default();
        config.backend.secondary_url = Some("ftp://mirror".to_string());
        assert!(config.validate().is_err());

        config.backend.secondary_url = Some("  ".to_string());
        config.apply_defaults();
        assert!(config.backend.secondary_url.is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("energydss-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[backend]
base_url = "https://dss.example.org"
timeout_seconds = 20

[analysis]
slope_limit_deg = 10.0
"#
        )
        .unwrap();

        let config = DssConfig::load_from_path(Some(path)).unwrap();
        assert_eq!(config.backend.base_url, "https://dss.example.org");
        assert_eq!(config.backend.timeout_seconds, 20);
        assert_eq!(config.analysis.slope_limit_deg, 10.0);
        assert_eq!(config.logging.format, "pretty");

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = DssConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("energydss"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
