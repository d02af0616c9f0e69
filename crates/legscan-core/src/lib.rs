//! Causal leg and swing detection over OHLC bars
//!
//! Incremental price-structure engine: every bar is classified against its
//! predecessor, directional legs are created, extended and pruned, and legs
//! that retrace far enough are promoted to swings with a Fibonacci
//! reference frame.
//!
//! ## Features
//!
//! - Causal: a bar only ever affects state through its own index
//! - Deterministic: ordered maps throughout, identical input gives identical events
//! - Resumable: [`DetectorState`] snapshots continue a stream bit-for-bit
//! - Bounded: pruning keeps the live leg set small on long histories
//!
//! ## Example
//!
//! ```
//! use legscan_core::{Bar, Detector, DetectorConfig};
//!
//! let mut detector = Detector::new(DetectorConfig::default()).unwrap();
//! let events = detector
//!     .process_bar(Bar::new(0, 0, 100.0, 101.0, 99.0, 100.5))
//!     .unwrap();
//! assert!(events.is_empty());
//! ```

pub mod calibration;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod errors;
pub mod events;
pub mod frame;
pub mod graph;
pub mod leg;
pub mod metrics;
pub mod pruner;
pub mod reference;
pub mod types;

// Test utilities (only available in test builds or with test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use calibration::{calibrate, calibrate_with_interval, CalibrationProgress};
pub use checkpoint::{DetectorState, PositionVerification};
pub use classifier::classify;
pub use config::{
    DetectorConfig, OriginProximityConfig, ReferenceConfig, SalienceWeights, SurvivorStrategy,
};
pub use detector::Detector;
pub use errors::{ConfigError, DataError, DetectorError, ErrorCategory, InternalInvariantError};
pub use events::{Event, PruneReason};
pub use frame::{CrossDirection, ReferenceFrame, FIB_LEVELS};
pub use graph::LegGraph;
pub use leg::{CounterRange, Leg, LegId};
pub use reference::{ReferenceState, ReferenceSwing, Scale};
pub use types::{Bar, BarType, Direction, PerDirection, PricePoint};
