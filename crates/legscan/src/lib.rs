//! Incremental price-structure detection over OHLC bars
//!
//! Turns a bar stream into directional legs, promotes legs that retrace far
//! enough into swings, and ranks swings into Fibonacci reference frames,
//! without ever looking ahead.
//!
//! ## Meta-Crate
//!
//! This crate re-exports the legscan sub-crates:
//!
//! - `legscan-core` - Detector, leg graph, pruning, reference layer
//! - `legscan-config` - Layered settings and logging bootstrap
//!
//! ## Features
//!
//! - `config` - Configuration management (default)
//! - `test-utils` - Bar builders and deterministic generators
//! - `full` - Enable all features
//!
//! ## Basic Usage
//!
//! ```rust
//! use legscan::{Bar, Detector, DetectorConfig, Event};
//!
//! let mut detector = Detector::new(DetectorConfig::default()).unwrap();
//! detector.process_bar(Bar::new(0, 0, 100.0, 102.0, 100.0, 101.0)).unwrap();
//! let events = detector
//!     .process_bar(Bar::new(1, 60, 101.0, 120.0, 101.0, 119.0))
//!     .unwrap();
//!
//! assert!(matches!(events[0], Event::LegCreated { .. }));
//! ```
//!
//! ## Pause and Resume
//!
//! ```rust
//! use legscan::{Detector, DetectorConfig, DetectorState};
//!
//! let detector = Detector::new(DetectorConfig::default()).unwrap();
//! let json = serde_json::to_string(&detector.snapshot()).unwrap();
//! let state: DetectorState = serde_json::from_str(&json).unwrap();
//! let resumed = Detector::from_state(state).unwrap();
//! assert_eq!(resumed.bars_processed(), 0);
//! ```

// Re-export core (always available)
pub use legscan_core as core;

#[cfg(feature = "config")]
pub use legscan_config as config;

// Re-export commonly used types at crate root for convenience
pub use legscan_core::{
    calibrate, Bar, BarType, ConfigError, DataError, Detector, DetectorConfig, DetectorError,
    DetectorState, Direction, Event, Leg, LegId, PositionVerification, PruneReason,
    ReferenceConfig, ReferenceState, ReferenceSwing, Scale,
};

#[cfg(feature = "config")]
pub use legscan_config::{init_logging, AppConfig, Settings};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Validated detector built from loaded settings
#[cfg(feature = "config")]
pub fn detector_from_settings(settings: Settings) -> Result<Detector, ConfigError> {
    Detector::new(settings.into_detector_config()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "legscan");
        assert!(!DESCRIPTION.is_empty());
    }

    #[test]
    fn test_core_module_path() {
        let frame = core::frame::ReferenceFrame::new(200.0, 100.0, Direction::Bull);
        assert_eq!(frame.range(), 100.0);
        assert_eq!(frame.price(0.5), 150.0);
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_settings_export() {
        let settings = Settings::default();
        assert!(!settings.app.name.is_empty());
        assert!(detector_from_settings(settings).is_ok());
    }
}
