//! Application-wide configuration settings

use legscan_core::calibration::DEFAULT_PROGRESS_INTERVAL;
use serde::{Deserialize, Serialize};

/// Application-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name for logging and identification
    pub name: String,

    /// Global log level (overridden by `RUST_LOG` when set)
    pub log_level: LogLevel,

    /// Bars between calibration progress reports (0 reports only at the end)
    pub progress_interval: usize,
}

/// Log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "legscan".to_string(),
            log_level: LogLevel::Info,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl AppConfig {
    /// Directive used when `RUST_LOG` is unset: the configured level for
    /// legscan crates, `warn` for everything else
    pub fn default_directive(&self) -> String {
        let level = self.log_level.as_str();
        format!("warn,legscan={level},legscan_core={level},legscan_config={level}")
    }

    pub fn is_debug(&self) -> bool {
        matches!(self.log_level, LogLevel::Debug | LogLevel::Trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let config = AppConfig::default();
        assert_eq!(
            config.default_directive(),
            "warn,legscan=info,legscan_core=info,legscan_config=info"
        );
    }

    #[test]
    fn test_debug_mode_detection() {
        let mut config = AppConfig::default();
        assert!(!config.is_debug());

        config.log_level = LogLevel::Trace;
        assert!(config.is_debug());
    }
}
