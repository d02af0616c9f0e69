//! Legs: candidate directional moves from an origin to a defended pivot
//!
//! A leg is the only structural record the detector keeps. A formed leg is
//! a swing; there is no separate swing type. Whether a leg is still intact
//! is decided by `max_origin_breach` alone.

use crate::frame::ReferenceFrame;
use crate::metrics::{self, ContributionMoments};
use crate::types::{Direction, PricePoint};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic leg identifier
///
/// Derived from direction and origin as `bull_12_101.5`. A second live leg
/// from the same origin gets its pivot index appended (`bull_12_101.5@30`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegId(String);

impl LegId {
    pub fn derive(direction: Direction, origin: PricePoint) -> Self {
        Self(format!("{}_{}_{}", direction, origin.index, origin.price))
    }

    /// Disambiguated id for a leg sharing its origin with a live leg
    pub fn with_pivot(&self, pivot_index: u64) -> Self {
        Self(format!("{}@{}", self.0, pivot_index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LegId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Largest opposite-direction range ending at a leg's origin
///
/// `Unknown` only while no opposite leg has ever existed; afterwards a
/// missing counter leg is a measured `Zero`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterRange {
    Unknown,
    Zero,
    Measured(f64),
}

impl CounterRange {
    pub fn value(self) -> Option<f64> {
        match self {
            CounterRange::Unknown => None,
            CounterRange::Zero => Some(0.0),
            CounterRange::Measured(v) => Some(v),
        }
    }

    pub fn is_known(self) -> bool {
        self != CounterRange::Unknown
    }
}

/// Shape of the parent's move, captured when a child leg is created inside it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentSnapshot {
    /// Parent pivot at the child's creation
    pub deepest_price: f64,
    pub deepest_index: u64,

    /// Parent origin to the deepest price
    pub impulse_to_deepest: f64,

    /// Deepest price back to the child's origin
    pub impulse_back: f64,
}

impl SegmentSnapshot {
    pub fn net_impulse(&self) -> f64 {
        self.impulse_to_deepest - self.impulse_back
    }
}

/// A candidate (or, once formed, confirmed) directional move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    // === IDENTITY ===
    pub id: LegId,
    pub direction: Direction,

    // === GEOMETRY ===
    /// Fixed once created
    pub origin_price: f64,
    pub origin_index: u64,

    /// Extends monotonically while unformed; frozen from formation on
    pub pivot_price: f64,
    pub pivot_index: u64,

    // === HIERARCHY ===
    pub parent_leg_id: Option<LegId>,

    /// Distance from a root leg, kept in sync by the graph on reparenting
    pub depth: u32,

    // === LIFECYCLE ===
    pub created_at: u64,
    pub formed: bool,
    pub formed_at: Option<u64>,

    /// Worst strict violation of the origin, in price units
    pub max_origin_breach: Option<f64>,

    /// Worst wick violation of the frozen pivot, in price units
    pub max_pivot_breach: Option<f64>,

    /// Worst close violation of the frozen pivot, in price units
    pub max_pivot_close_breach: Option<f64>,

    /// Price and bar of the furthest pivot breach
    pub breach_extreme: Option<PricePoint>,

    /// Set once the swing has been reported invalidated
    pub pivot_violated: bool,

    /// Deepest retracement ratio seen since the pivot last moved
    pub deepest_retracement: f64,

    // === METRICS ===
    pub impulse: f64,
    pub impulsiveness: Option<f64>,
    pub moments: ContributionMoments,
    pub max_counter_leg_range: CounterRange,
    pub segment: Option<SegmentSnapshot>,
}

impl Leg {
    pub fn new(
        id: LegId,
        direction: Direction,
        origin: PricePoint,
        pivot: PricePoint,
        created_at: u64,
    ) -> Self {
        let range = (pivot.price - origin.price).abs();
        Self {
            id,
            direction,
            origin_price: origin.price,
            origin_index: origin.index,
            pivot_price: pivot.price,
            pivot_index: pivot.index,
            parent_leg_id: None,
            depth: 0,
            created_at,
            formed: false,
            formed_at: None,
            max_origin_breach: None,
            max_pivot_breach: None,
            max_pivot_close_breach: None,
            breach_extreme: None,
            pivot_violated: false,
            deepest_retracement: 0.0,
            impulse: metrics::impulse(range, pivot.index.saturating_sub(origin.index)),
            impulsiveness: None,
            moments: ContributionMoments::default(),
            max_counter_leg_range: CounterRange::Unknown,
            segment: None,
        }
    }

    pub fn origin(&self) -> PricePoint {
        PricePoint::new(self.origin_price, self.origin_index)
    }

    pub fn pivot(&self) -> PricePoint {
        PricePoint::new(self.pivot_price, self.pivot_index)
    }

    pub fn range(&self) -> f64 {
        (self.pivot_price - self.origin_price).abs()
    }

    /// Bars from origin to pivot
    pub fn duration(&self) -> u64 {
        self.pivot_index.saturating_sub(self.origin_index)
    }

    pub fn frame(&self) -> ReferenceFrame {
        ReferenceFrame::new(self.pivot_price, self.origin_price, self.direction)
    }

    pub fn is_root(&self) -> bool {
        self.parent_leg_id.is_none()
    }

    pub fn is_origin_intact(&self) -> bool {
        self.max_origin_breach.is_none()
    }

    /// Both ends breached
    pub fn is_engulfed(&self) -> bool {
        self.max_origin_breach.is_some() && self.max_pivot_breach.is_some()
    }

    /// Unformed legs with an intact origin follow new extremes
    pub fn is_extendable(&self) -> bool {
        !self.formed && self.is_origin_intact()
    }

    /// Distance from the parent's segment-deepest price to this origin
    ///
    /// Zero for legs created without a parent.
    pub fn counter_trend_range(&self) -> f64 {
        self.segment
            .map(|s| (s.deepest_price - self.origin_price).abs())
            .unwrap_or(0.0)
    }

    pub fn net_segment_impulse(&self) -> Option<f64> {
        self.segment.map(|s| s.net_impulse())
    }

    pub fn spikiness(&self) -> f64 {
        self.moments.spikiness()
    }

    /// Move the pivot to a further extreme and refresh what depends on it
    pub(crate) fn extend_to(&mut self, pivot: PricePoint) {
        self.pivot_price = pivot.price;
        self.pivot_index = pivot.index;
        self.deepest_retracement = 0.0;
        self.impulse = metrics::impulse(self.range(), self.duration());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bull_leg() -> Leg {
        let origin = PricePoint::new(100.0, 5);
        Leg::new(
            LegId::derive(Direction::Bull, origin),
            Direction::Bull,
            origin,
            PricePoint::new(150.0, 10),
            10,
        )
    }

    #[test]
    fn test_id_is_derived_from_origin() {
        let id = LegId::derive(Direction::Bear, PricePoint::new(101.25, 12));
        assert_eq!(id.as_str(), "bear_12_101.25");
        assert_eq!(id.with_pivot(30).as_str(), "bear_12_101.25@30");
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = LegId::from("bull_3_99");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"bull_3_99\"");
    }

    #[test]
    fn test_new_leg_defaults() {
        let leg = bull_leg();
        assert_eq!(leg.range(), 50.0);
        assert_eq!(leg.duration(), 5);
        assert_eq!(leg.impulse, 10.0);
        assert!(leg.is_root());
        assert!(leg.is_extendable());
        assert_eq!(leg.max_counter_leg_range, CounterRange::Unknown);
        assert_eq!(leg.counter_trend_range(), 0.0);
        assert_eq!(leg.net_segment_impulse(), None);
    }

    #[test]
    fn test_frame_orientation() {
        let leg = bull_leg();
        let frame = leg.frame();
        assert_eq!(frame.ratio(150.0), 0.0);
        assert_eq!(frame.ratio(100.0), 1.0);
    }

    #[test]
    fn test_extend_resets_retracement() {
        let mut leg = bull_leg();
        leg.deepest_retracement = 0.3;
        leg.extend_to(PricePoint::new(160.0, 11));
        assert_eq!(leg.range(), 60.0);
        assert_eq!(leg.impulse, 10.0);
        assert_eq!(leg.deepest_retracement, 0.0);
    }

    #[test]
    fn test_engulfed_needs_both_breaches() {
        let mut leg = bull_leg();
        leg.max_origin_breach = Some(1.0);
        assert!(!leg.is_engulfed());
        assert!(!leg.is_extendable());
        leg.max_pivot_breach = Some(2.0);
        assert!(leg.is_engulfed());
    }

    #[test]
    fn test_counter_range_states() {
        assert_eq!(CounterRange::Unknown.value(), None);
        assert_eq!(CounterRange::Zero.value(), Some(0.0));
        assert_eq!(CounterRange::Measured(4.0).value(), Some(4.0));
        assert!(CounterRange::Zero.is_known());
    }

    #[test]
    fn test_segment_fields() {
        let mut leg = bull_leg();
        leg.segment = Some(SegmentSnapshot {
            deepest_price: 120.0,
            deepest_index: 4,
            impulse_to_deepest: 3.0,
            impulse_back: 1.0,
        });
        assert_eq!(leg.counter_trend_range(), 20.0);
        assert_eq!(leg.net_segment_impulse(), Some(2.0));
    }
}
