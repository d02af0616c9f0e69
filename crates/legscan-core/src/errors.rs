//! Error taxonomy
//!
//! Every failure of the engine belongs to exactly one of three categories:
//! bad input ([`DataError`]), bad configuration ([`ConfigError`]) or a defect
//! in the engine itself ([`InternalInvariantError`]).

use thiserror::Error;

/// Rejected input. The detector state is untouched when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Bar index out of order: last={last}, got={got}")]
    OutOfOrderIndex { last: u64, got: u64 },

    #[error("Duplicate bar index {index}")]
    DuplicateIndex { index: u64 },

    #[error("Timestamp not increasing at bar {index}: last={last}, got={got}")]
    NonMonotonicTimestamp { index: u64, last: i64, got: i64 },

    #[error("Non-finite {field} price at bar {index}")]
    NonFinitePrice { index: u64, field: &'static str },

    #[error(
        "Inconsistent OHLC at bar {index}: open={open}, high={high}, low={low}, close={close}"
    )]
    InconsistentOhlc {
        index: u64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    /// A snapshot handed to `Detector::from_state` failed validation
    #[error("Invalid detector state: {message}")]
    InvalidState { message: String },
}

/// Rejected configuration. Values are never clamped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be finite")]
    NonFinite { field: &'static str },

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("min_turn_ratio and max_turns_per_pivot are mutually exclusive")]
    ConflictingTurnModes,

    #[error("max_turns_per_pivot must be at least 1")]
    ZeroTurnsPerPivot,

    #[error("Scale percentiles must be strictly increasing within (0, 1): {0:?}")]
    InvalidPercentiles([f64; 3]),

    #[error("Salience weights must be finite, non-negative and not all zero")]
    InvalidWeights,
}

/// A broken internal invariant. Fatal: the detector refuses further bars.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InternalInvariantError {
    #[error(
        "Leg {leg_id} violates causal order: origin_index={origin_index} >= pivot_index={pivot_index}"
    )]
    CausalOrder {
        leg_id: String,
        origin_index: u64,
        pivot_index: u64,
    },

    #[error("Leg {leg_id} references missing parent {parent_id}")]
    DanglingParent { leg_id: String, parent_id: String },

    #[error("Leg {leg_id} caches depth {cached}, hierarchy gives {actual}")]
    DepthMismatch {
        leg_id: String,
        cached: u32,
        actual: u32,
    },

    #[error("Leg {leg_id} is not in the graph")]
    MissingLeg { leg_id: String },

    #[error("Leg {leg_id} already exists in the graph")]
    DuplicateLeg { leg_id: String },

    #[error("Detector poisoned by an earlier invariant violation; rebuild required")]
    Poisoned,
}

/// Error category, one per failure path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Data,
    Config,
    InternalInvariant,
}

/// Any error surfaced by the detector API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Invariant(#[from] InternalInvariantError),
}

impl DetectorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DetectorError::Data(_) => ErrorCategory::Data,
            DetectorError::Config(_) => ErrorCategory::Config,
            DetectorError::Invariant(_) => ErrorCategory::InternalInvariant,
        }
    }

    /// True when the detector must be rebuilt before further use
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::InternalInvariant
    }
}
