//! Incrementally maintained leg metrics
//!
//! - **Impulse**: range per bar of duration
//! - **Impulsiveness**: percentile rank of a leg's impulse within the
//!   population of every leg that ever formed (sorted vector, binary search)
//! - **Spikiness**: skewness of the per-bar contributions to a leg, squashed
//!   to 0..100 with a logistic curve (running moments, O(1) per bar)

use serde::{Deserialize, Serialize};

/// Neutral spikiness reported when the skewness is undefined
pub const NEUTRAL_SPIKINESS: f64 = 50.0;

const MIN_VARIANCE: f64 = 1e-12;

/// Price range per bar; durations below one bar count as one
#[inline]
pub fn impulse(range: f64, bars: u64) -> f64 {
    range / bars.max(1) as f64
}

/// Nearest-rank value of `sorted` at fraction `p` (0..=1)
///
/// Index is `floor(n * p)` clamped to the last element.
pub fn percentile_value(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// Sorted impulse values of every leg that has formed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImpulsePopulation {
    values: Vec<f64>,
}

impl ImpulsePopulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping the vector sorted
    pub fn insert(&mut self, impulse: f64) {
        let at = self.values.partition_point(|v| *v < impulse);
        self.values.insert(at, impulse);
    }

    /// Share of the population strictly below `impulse`, in percent
    ///
    /// `None` while the population is empty.
    pub fn percentile(&self, impulse: f64) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let below = self.values.partition_point(|v| *v < impulse);
        Some(below as f64 / self.values.len() as f64 * 100.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// False if a restored population lost its ordering or holds NaN
    pub fn is_well_formed(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
            && self.values.windows(2).all(|w| w[0] <= w[1])
    }
}

/// Running raw moments of a leg's per-bar contributions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributionMoments {
    pub count: u64,
    pub sum: f64,
    pub sum_sq: f64,
    pub sum_cube: f64,
}

impl ContributionMoments {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.sum_sq += x * x;
        self.sum_cube += x * x * x;
    }

    /// Population skewness; `None` below three samples or with zero variance
    pub fn skewness(&self) -> Option<f64> {
        if self.count < 3 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let m2 = self.sum_sq / n - mean * mean;
        if m2 <= MIN_VARIANCE {
            return None;
        }
        let m3 = self.sum_cube / n - 3.0 * mean * self.sum_sq / n + 2.0 * mean.powi(3);
        Some(m3 / m2.powf(1.5))
    }

    /// Skewness mapped to 0..100 (50 = symmetric)
    pub fn spikiness(&self) -> f64 {
        match self.skewness() {
            Some(skew) => 100.0 / (1.0 + (-skew).exp()),
            None => NEUTRAL_SPIKINESS,
        }
    }
}
