//! Detector state snapshot for pause/resume
//!
//! Everything the detector needs to continue a stream lives in
//! [`DetectorState`]; the struct is serialized field for field, so any
//! tree-shaped format round-trips it.
//!
//! ```text
//! bars 0..k   -> snapshot() -> JSON
//! JSON        -> Detector::from_state() -> bars k+1.. (same events as one run)
//! ```
//!
//! ## Key Invariants
//!
//! - Snapshots are taken between bars only; there is no mid-bar state
//! - `impulse_population` stays sorted and holds one entry per formed leg
//! - A restored state is validated before a detector accepts it

use crate::config::DetectorConfig;
use crate::errors::DataError;
use crate::graph::LegGraph;
use crate::metrics::ImpulsePopulation;
use crate::pruner::DeferredReplacement;
use crate::types::{Bar, PerDirection, PricePoint};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorState {
    // === CONFIGURATION ===
    pub config: DetectorConfig,

    // === STRUCTURE ===
    /// Live legs keyed by id
    pub legs: LegGraph,

    /// Extremes waiting to become leg origins (bull: lowest low, bear: highest high)
    pub pending_origins: PerDirection<Option<PricePoint>>,

    /// Breach replacements waiting for a bar that favors their direction
    #[serde(default)]
    pub deferred_replacements: Vec<DeferredReplacement>,

    // === METRICS ===
    /// Impulses of every leg that ever formed, sorted
    pub impulse_population: ImpulsePopulation,

    // === BOOKKEEPING ===
    /// Whether any leg of each direction was ever created
    pub leg_ever_created: PerDirection<bool>,

    pub formed_count: u64,

    /// Last accepted bar (None before the first bar)
    pub last_bar: Option<Bar>,

    pub bars_processed: u64,
}

impl DetectorState {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            legs: LegGraph::new(),
            pending_origins: PerDirection::default(),
            deferred_replacements: Vec::new(),
            impulse_population: ImpulsePopulation::new(),
            leg_ever_created: PerDirection::default(),
            formed_count: 0,
            last_bar: None,
            bars_processed: 0,
        }
    }

    /// Library version writing the snapshot
    pub fn library_version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn has_pending_origins(&self) -> bool {
        self.pending_origins.bull.is_some() || self.pending_origins.bear.is_some()
    }

    /// Index the next bar is expected to carry (None also after `u64::MAX`)
    pub fn next_index(&self) -> Option<u64> {
        self.last_bar.and_then(|bar| bar.index.checked_add(1))
    }

    /// Check that `bar` continues the stream right after this snapshot
    pub fn verify_position(&self, bar: &Bar) -> PositionVerification {
        let Some(last) = self.last_bar else {
            return PositionVerification::Exact;
        };
        if bar.index <= last.index {
            return PositionVerification::Stale {
                last: last.index,
                got: bar.index,
            };
        }
        // bar.index > last.index, so this cannot overflow
        let expected = last.index + 1;
        if bar.index == expected {
            PositionVerification::Exact
        } else {
            PositionVerification::Gap {
                expected,
                actual: bar.index,
                missing: bar.index - expected,
            }
        }
    }

    /// Reject snapshots a detector could not have produced
    pub fn validate(&self) -> Result<(), DataError> {
        self.config.validate().map_err(|e| invalid(format!("config: {e}")))?;
        self.legs.validate().map_err(|e| invalid(format!("legs: {e}")))?;

        if !self.impulse_population.is_well_formed() {
            return Err(invalid("impulse population is not sorted".to_string()));
        }
        if self.impulse_population.len() as u64 != self.formed_count {
            return Err(invalid(format!(
                "formed_count {} does not match population size {}",
                self.formed_count,
                self.impulse_population.len()
            )));
        }

        match self.last_bar {
            None => {
                if !self.legs.is_empty()
                    || self.has_pending_origins()
                    || !self.deferred_replacements.is_empty()
                    || self.bars_processed > 0
                {
                    return Err(invalid("structure present before any bar".to_string()));
                }
            }
            Some(last) => {
                if let Some(leg) = self.legs.iter().find(|leg| leg.pivot_index > last.index) {
                    return Err(invalid(format!(
                        "leg {} pivots after the last bar {}",
                        leg.id, last.index
                    )));
                }
                let pending = [self.pending_origins.bull, self.pending_origins.bear];
                if pending.iter().flatten().any(|p| p.index > last.index) {
                    return Err(invalid("pending origin after the last bar".to_string()));
                }
                for waiting in &self.deferred_replacements {
                    if waiting.origin.index >= waiting.extreme.index
                        || waiting.extreme.index > last.index
                    {
                        return Err(invalid(format!(
                            "deferred {} replacement from bar {} out of order",
                            waiting.direction, waiting.origin.index
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> DataError {
    DataError::InvalidState { message }
}

/// Where a bar sits relative to the end of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionVerification {
    /// Next index after the snapshot (or any bar for an empty snapshot)
    Exact,

    /// Bars missing between the snapshot and this bar
    Gap {
        expected: u64,
        actual: u64,
        missing: u64,
    },

    /// Bar at or before the snapshot's last bar; would be rejected
    Stale { last: u64, got: u64 },
}

impl PositionVerification {
    pub fn has_gap(&self) -> bool {
        matches!(self, PositionVerification::Gap { .. })
    }

    pub fn is_acceptable(&self) -> bool {
        !matches!(self, PositionVerification::Stale { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn state_after(index: u64) -> DetectorState {
        let mut state = DetectorState::new(DetectorConfig::default());
        state.last_bar = Some(Bar::new(index, index as i64, 1.0, 1.0, 1.0, 1.0));
        state.bars_processed = index.saturating_add(1);
        state
    }

    #[test]
    fn test_empty_state_is_valid() {
        let state = DetectorState::new(DetectorConfig::default());
        assert!(state.validate().is_ok());
        assert!(!state.has_pending_origins());
        assert_eq!(state.next_index(), None);
    }

    #[test]
    fn test_position_verification() {
        let state = state_after(10);
        let bar = |i: u64| Bar::new(i, i as i64, 1.0, 1.0, 1.0, 1.0);

        assert_eq!(state.verify_position(&bar(11)), PositionVerification::Exact);
        assert_eq!(
            state.verify_position(&bar(14)),
            PositionVerification::Gap {
                expected: 11,
                actual: 14,
                missing: 3
            }
        );
        let stale = state.verify_position(&bar(10));
        assert_eq!(stale, PositionVerification::Stale { last: 10, got: 10 });
        assert!(!stale.is_acceptable());
        assert!(state.verify_position(&bar(14)).has_gap());
    }

    #[test]
    fn test_position_at_index_limit() {
        let state = state_after(u64::MAX);
        assert_eq!(state.next_index(), None);
        let bar = Bar::new(u64::MAX, 0, 1.0, 1.0, 1.0, 1.0);
        assert_eq!(
            state.verify_position(&bar),
            PositionVerification::Stale {
                last: u64::MAX,
                got: u64::MAX
            }
        );
        assert_eq!(state_after(u64::MAX - 1).next_index(), Some(u64::MAX));
    }

    #[test]
    fn test_validate_rejects_future_deferred_replacement() {
        let mut state = state_after(5);
        state.deferred_replacements.push(DeferredReplacement {
            direction: Direction::Bull,
            origin: PricePoint::new(100.0, 2),
            extreme: PricePoint::new(130.0, 7),
        });
        assert!(state.validate().is_err());
        state.deferred_replacements[0].extreme.index = 4;
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_population_mismatch() {
        let mut state = state_after(5);
        state.formed_count = 2;
        assert!(matches!(
            state.validate(),
            Err(DataError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_future_pending_origin() {
        let mut state = state_after(5);
        *state.pending_origins.get_mut(Direction::Bull) = Some(PricePoint::new(1.0, 9));
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let mut state = state_after(5);
        state.config.min_branch_ratio = -1.0;
        let err = state.validate().unwrap_err();
        assert!(err.to_string().contains("min_branch_ratio"));
    }

    #[test]
    fn test_json_round_trip() {
        let mut state = state_after(3);
        state.pending_origins.bear = Some(PricePoint::new(12.5, 2));
        state.leg_ever_created.bull = true;
        let json = serde_json::to_string(&state).unwrap();
        let back: DetectorState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_library_version() {
        assert!(!DetectorState::library_version().is_empty());
    }
}
