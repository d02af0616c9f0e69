//! Detector configuration
//!
//! Plain serde values with defaults. Loading from files or the environment
//! is left to callers; this module only validates.

use crate::errors::ConfigError;
use crate::types::PerDirection;
use serde::{Deserialize, Serialize};

/// Which leg survives an origin-proximity cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivorStrategy {
    /// Earliest origin wins
    #[default]
    Oldest,
    /// Largest counter-trend range wins, ties to the earliest origin
    CounterTrend,
}

/// Origin-proximity consolidation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginProximityConfig {
    /// Max relative range difference between clustered legs (0 ignores range)
    pub range_threshold: f64,

    /// Max origin distance relative to leg age (0 ignores time)
    pub time_threshold: f64,

    pub survivor: SurvivorStrategy,
}

impl Default for OriginProximityConfig {
    fn default() -> Self {
        Self {
            range_threshold: 0.05,
            time_threshold: 0.10,
            survivor: SurvivorStrategy::Oldest,
        }
    }
}

impl OriginProximityConfig {
    /// Both thresholds at zero disables the strategy
    pub fn is_enabled(&self) -> bool {
        self.range_threshold > 0.0 || self.time_threshold > 0.0
    }
}

/// Weights of the composite salience score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalienceWeights {
    pub range: f64,
    pub impulse: f64,
    pub recency: f64,
    pub depth: f64,
}

impl Default for SalienceWeights {
    fn default() -> Self {
        Self {
            range: 0.4,
            impulse: 0.2,
            recency: 0.3,
            depth: 0.1,
        }
    }
}

impl SalienceWeights {
    fn as_array(&self) -> [f64; 4] {
        [self.range, self.impulse, self.recency, self.depth]
    }
}

/// Reference layer parameters, independent of the leg graph's own thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub enabled: bool,

    /// Legs that must have formed before references are ranked
    pub min_formed_legs: usize,

    /// Retracement needed before a leg becomes a reference
    pub formation_fib: f64,

    /// Range percentiles separating S|M, M|L and L|XL
    pub scale_percentiles: [f64; 3],

    /// Fatal breach tolerances for S and M scale references
    pub small_wick_tolerance: f64,
    pub small_close_tolerance: f64,

    /// Fatal breach tolerances for L and XL scale references
    pub big_wick_tolerance: f64,
    pub big_close_tolerance: f64,

    /// Score by range times counter-trend only, ignoring `weights`
    pub standalone_salience: bool,

    pub weights: SalienceWeights,

    /// Age in bars at which the recency term halves
    pub recency_half_life: f64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_formed_legs: 10,
            formation_fib: 0.382,
            scale_percentiles: [0.4, 0.7, 0.9],
            small_wick_tolerance: 0.0,
            small_close_tolerance: 0.0,
            big_wick_tolerance: 0.15,
            big_close_tolerance: 0.10,
            standalone_salience: false,
            weights: SalienceWeights::default(),
            recency_half_life: 50.0,
        }
    }
}

/// Full detector configuration
///
/// Turn-ratio pruning runs in at most one mode: `min_turn_ratio` (threshold)
/// or `max_turns_per_pivot` (top-k). Use the `with_*` setters to switch modes;
/// each resets the other to disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Retracement ratio promoting a candidate leg to a swing
    pub formation_fib: PerDirection<f64>,

    /// Pivot breach, as a fraction of range, that prunes and replaces a swing
    pub breach_tolerance: PerDirection<f64>,

    /// Origin breach, in multiples of range, that drops a breached leg (0 disables)
    pub stale_extension_multiplier: f64,

    pub origin_proximity: OriginProximityConfig,

    /// Fraction of the parent's counter-trend a child origin must retrace (0 disables)
    pub min_branch_ratio: f64,

    /// Threshold mode of turn-ratio pruning
    pub min_turn_ratio: Option<f64>,

    /// Top-k mode of turn-ratio pruning
    pub max_turns_per_pivot: Option<usize>,

    /// Delete legs whose origin and pivot are both breached
    pub enable_engulfed_prune: bool,

    /// Emit `LevelCross` events for formed legs
    pub emit_level_crosses: bool,

    /// Range percentile from which a leg counts as big
    pub big_swing_percentile: f64,

    /// Live legs required before any leg counts as big
    pub big_swing_min_population: usize,

    /// Pivot violation tolerances of big legs (wick and close)
    pub big_swing_wick_tolerance: f64,
    pub big_swing_close_tolerance: f64,

    pub reference: ReferenceConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            formation_fib: PerDirection::splat(0.382),
            breach_tolerance: PerDirection::splat(0.2),
            stale_extension_multiplier: 3.0,
            origin_proximity: OriginProximityConfig::default(),
            min_branch_ratio: 0.1,
            min_turn_ratio: None,
            max_turns_per_pivot: None,
            enable_engulfed_prune: true,
            emit_level_crosses: false,
            big_swing_percentile: 0.9,
            big_swing_min_population: 10,
            big_swing_wick_tolerance: 0.15,
            big_swing_close_tolerance: 0.10,
            reference: ReferenceConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Switch turn-ratio pruning to threshold mode
    pub fn with_min_turn_ratio(mut self, ratio: f64) -> Self {
        self.min_turn_ratio = Some(ratio);
        self.max_turns_per_pivot = None;
        self
    }

    /// Switch turn-ratio pruning to top-k mode
    pub fn with_max_turns_per_pivot(mut self, k: usize) -> Self {
        self.max_turns_per_pivot = Some(k);
        self.min_turn_ratio = None;
        self
    }

    pub fn without_turn_ratio_pruning(mut self) -> Self {
        self.min_turn_ratio = None;
        self.max_turns_per_pivot = None;
        self
    }

    /// Disable every pruning strategy that has an off switch
    pub fn without_optional_pruning(mut self) -> Self {
        self.origin_proximity.range_threshold = 0.0;
        self.origin_proximity.time_threshold = 0.0;
        self.min_branch_ratio = 0.0;
        self.stale_extension_multiplier = 0.0;
        self.enable_engulfed_prune = false;
        self.without_turn_ratio_pruning()
    }

    pub fn turn_ratio_enabled(&self) -> bool {
        self.min_turn_ratio.is_some() || self.max_turns_per_pivot.is_some()
    }

    /// Check every field; returns the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("formation_fib.bull", self.formation_fib.bull),
            ("formation_fib.bear", self.formation_fib.bear),
        ] {
            check_range(field, value, 0.0, 1.0)?;
        }
        check_non_negative("breach_tolerance.bull", self.breach_tolerance.bull)?;
        check_non_negative("breach_tolerance.bear", self.breach_tolerance.bear)?;
        check_non_negative("stale_extension_multiplier", self.stale_extension_multiplier)?;
        check_non_negative(
            "origin_proximity.range_threshold",
            self.origin_proximity.range_threshold,
        )?;
        check_non_negative(
            "origin_proximity.time_threshold",
            self.origin_proximity.time_threshold,
        )?;
        check_non_negative("min_branch_ratio", self.min_branch_ratio)?;

        match (self.min_turn_ratio, self.max_turns_per_pivot) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingTurnModes),
            (Some(ratio), None) => check_non_negative("min_turn_ratio", ratio)?,
            (None, Some(0)) => return Err(ConfigError::ZeroTurnsPerPivot),
            _ => {}
        }

        check_range("big_swing_percentile", self.big_swing_percentile, 0.0, 1.0)?;
        check_non_negative("big_swing_wick_tolerance", self.big_swing_wick_tolerance)?;
        check_non_negative("big_swing_close_tolerance", self.big_swing_close_tolerance)?;

        self.reference.validate()
    }
}

impl ReferenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("reference.formation_fib", self.formation_fib, 0.0, 1.0)?;

        let [m, l, xl] = self.scale_percentiles;
        let increasing = 0.0 < m && m < l && l < xl && xl < 1.0;
        if !increasing {
            return Err(ConfigError::InvalidPercentiles(self.scale_percentiles));
        }

        check_non_negative("reference.small_wick_tolerance", self.small_wick_tolerance)?;
        check_non_negative("reference.small_close_tolerance", self.small_close_tolerance)?;
        check_non_negative("reference.big_wick_tolerance", self.big_wick_tolerance)?;
        check_non_negative("reference.big_close_tolerance", self.big_close_tolerance)?;

        if !self.standalone_salience {
            let weights = self.weights.as_array();
            let valid = weights.iter().all(|w| w.is_finite() && *w >= 0.0);
            if !valid || weights.iter().sum::<f64>() <= 0.0 {
                return Err(ConfigError::InvalidWeights);
            }
        }

        if !self.recency_half_life.is_finite() || self.recency_half_life <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "reference.recency_half_life",
                value: self.recency_half_life,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }

        Ok(())
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite { field });
    }
    if value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite { field });
    }
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_turn_modes_reset_each_other() {
        let config = DetectorConfig::default().with_min_turn_ratio(0.5);
        assert_eq!(config.min_turn_ratio, Some(0.5));

        let config = config.with_max_turns_per_pivot(2);
        assert_eq!(config.min_turn_ratio, None);
        assert_eq!(config.max_turns_per_pivot, Some(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_both_turn_modes_rejected() {
        let config = DetectorConfig {
            min_turn_ratio: Some(0.3),
            max_turns_per_pivot: Some(3),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ConflictingTurnModes));
    }

    #[test]
    fn test_negative_values_rejected_not_clamped() {
        let mut config = DetectorConfig::default();
        config.breach_tolerance.bear = -0.1;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Negative {
                field: "breach_tolerance.bear",
                value: -0.1
            })
        );
        assert_eq!(config.breach_tolerance.bear, -0.1);
    }

    #[test]
    fn test_non_finite_rejected() {
        let config = DetectorConfig {
            stale_extension_multiplier: f64::NAN,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonFinite {
                field: "stale_extension_multiplier"
            })
        );
    }

    #[test]
    fn test_zero_turns_per_pivot_rejected() {
        let config = DetectorConfig::default().with_max_turns_per_pivot(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTurnsPerPivot));
    }

    #[test]
    fn test_reference_percentiles_must_increase() {
        let mut config = DetectorConfig::default();
        config.reference.scale_percentiles = [0.5, 0.5, 0.9];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPercentiles(_))
        ));
    }

    #[test]
    fn test_weights_ignored_in_standalone_mode() {
        let mut config = DetectorConfig::default();
        config.reference.weights = SalienceWeights {
            range: 0.0,
            impulse: 0.0,
            recency: 0.0,
            depth: 0.0,
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidWeights));

        config.reference.standalone_salience = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_proximity_disabled_when_both_zero() {
        let config = DetectorConfig::default().without_optional_pruning();
        assert!(!config.origin_proximity.is_enabled());
        assert!(!config.turn_ratio_enabled());
        assert!(config.validate().is_ok());
    }
}
