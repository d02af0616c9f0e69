//! Configuration management for legscan
//!
//! Centralized configuration handling with support for:
//! - Default values
//! - Configuration files (TOML)
//! - Environment variables
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables (`LEGSCAN_` prefix, `__` between nested keys)
//! 2. Configuration file (`legscan.toml` in the working directory)
//! 3. Default values
//!
//! ```text
//! LEGSCAN_APP__LOG_LEVEL=debug
//! LEGSCAN_DETECTOR__MIN_BRANCH_RATIO=0.2
//! LEGSCAN_DETECTOR__REFERENCE__MIN_FORMED_LEGS=25
//! ```

mod app;
mod logging;

// Re-export main types
pub use app::{AppConfig, LogLevel};
pub use logging::{env_filter, init_logging};

use legscan_core::{ConfigError as DetectorConfigError, DetectorConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Root configuration structure containing all configuration categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Application-wide settings
    pub app: AppConfig,

    /// Detection thresholds and pruning strategies
    pub detector: DetectorConfig,
}

impl Settings {
    /// Load configuration from multiple sources with proper precedence
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&Settings::default())?)
            // Add configuration file if it exists
            .add_source(
                config::File::with_name("legscan")
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            // Field names carry underscores, so nesting uses a double one
            .add_source(
                config::Environment::with_prefix("LEGSCAN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        debug!(
            event_type = "settings_loaded",
            app = %settings.app.name,
            log_level = settings.app.log_level.as_str(),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::from(path).format(config::FileFormat::Toml));

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Detector configuration after validation
    pub fn into_detector_config(self) -> Result<DetectorConfig, DetectorConfigError> {
        self.detector.validate()?;
        Ok(self.detector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legscan_core::SurvivorStrategy;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.app.name, "legscan");
        assert_eq!(settings.detector, DetectorConfig::default());
        assert!(settings.into_detector_config().is_ok());
    }

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();
        let toml_str = toml::to_string(&settings).expect("Failed to serialize to TOML");
        let back: Settings = toml::from_str(&toml_str).expect("Failed to deserialize from TOML");
        assert_eq!(back, settings);
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[app]
log_level = "debug"

[detector]
min_branch_ratio = 0.25
max_turns_per_pivot = 3

[detector.origin_proximity]
survivor = "counter_trend"

[detector.reference]
min_formed_legs = 4
"#
        )
        .unwrap();

        let settings = Settings::load_from_file(file.path()).unwrap();
        assert_eq!(settings.app.log_level, LogLevel::Debug);
        assert_eq!(settings.app.name, "legscan");

        let detector = settings.into_detector_config().unwrap();
        assert_eq!(detector.min_branch_ratio, 0.25);
        assert_eq!(detector.max_turns_per_pivot, Some(3));
        assert_eq!(
            detector.origin_proximity.survivor,
            SurvivorStrategy::CounterTrend
        );
        assert_eq!(detector.reference.min_formed_legs, 4);
        assert_eq!(detector.formation_fib, DetectorConfig::default().formation_fib);
    }

    #[test]
    fn test_invalid_detector_section_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[detector]\nmin_turn_ratio = 0.3\nmax_turns_per_pivot = 2"
        )
        .unwrap();

        let settings = Settings::load_from_file(file.path()).unwrap();
        assert_eq!(
            settings.into_detector_config().unwrap_err(),
            DetectorConfigError::ConflictingTurnModes
        );
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let settings = Settings::load().unwrap();
        assert_eq!(settings.app.progress_interval, AppConfig::default().progress_interval);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load_from_file(&dir.path().join("absent.toml")).is_err());
    }
}
