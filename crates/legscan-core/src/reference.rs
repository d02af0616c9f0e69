//! Reference layer: ranked view of the swings worth trading against
//!
//! Computed on demand from the live legs; nothing here is stored in the
//! detector state. Scale buckets are relative: cut points are percentiles
//! of the live range distribution at the time of the query.

use crate::config::ReferenceConfig;
use crate::graph::LegGraph;
use crate::leg::{Leg, LegId};
use crate::metrics::percentile_value;
use crate::types::{Bar, Direction, PerDirection};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Neutral impulse term for legs without an impulsiveness rank
const NEUTRAL_IMPULSE: f64 = 0.5;

/// Relative size bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scale {
    S,
    M,
    L,
    #[serde(rename = "XL")]
    Xl,
}

impl Scale {
    /// L and XL references get the wider breach tolerances
    pub fn is_big(self) -> bool {
        matches!(self, Scale::L | Scale::Xl)
    }
}

/// Range cut points separating S|M, M|L and L|XL
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleCuts {
    m: f64,
    l: f64,
    xl: f64,
}

impl ScaleCuts {
    /// Cut points from the ranges of `legs`; `None` for an empty set
    pub fn from_legs<'a>(
        legs: impl Iterator<Item = &'a Leg>,
        percentiles: [f64; 3],
    ) -> Option<Self> {
        let mut ranges: Vec<f64> = legs.map(Leg::range).collect();
        ranges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        Some(Self {
            m: percentile_value(&ranges, percentiles[0])?,
            l: percentile_value(&ranges, percentiles[1])?,
            xl: percentile_value(&ranges, percentiles[2])?,
        })
    }

    pub fn classify(&self, range: f64) -> Scale {
        if range >= self.xl {
            Scale::Xl
        } else if range >= self.l {
            Scale::L
        } else if range >= self.m {
            Scale::M
        } else {
            Scale::S
        }
    }
}

/// A leg viewed as a reference swing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSwing {
    pub leg_id: LegId,
    pub direction: Direction,
    pub scale: Scale,
    /// Ratio of the last close within the swing's frame
    pub location: f64,
    pub salience_score: f64,
    pub range: f64,
    pub origin_price: f64,
    pub pivot_price: f64,
    pub depth: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceState {
    /// Salience descending, then id ascending
    pub references: Vec<ReferenceSwing>,
    pub by_scale: BTreeMap<Scale, Vec<LegId>>,
    pub by_direction: PerDirection<Vec<LegId>>,
    /// (bull - bear) / (bull + bear), 0 when empty
    pub direction_imbalance: f64,
    /// Too few formed legs to rank against yet
    pub warming_up: bool,
}

impl ReferenceState {
    fn warming_up() -> Self {
        Self {
            warming_up: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Most salient reference, if any
    pub fn top(&self) -> Option<&ReferenceSwing> {
        self.references.first()
    }
}

/// Rank the live legs of `graph` as references
pub fn evaluate(
    graph: &LegGraph,
    formed_count: u64,
    last_bar: Option<&Bar>,
    config: &ReferenceConfig,
) -> ReferenceState {
    let Some(bar) = last_bar else {
        return ReferenceState::warming_up();
    };
    if !config.enabled || formed_count < config.min_formed_legs as u64 {
        return ReferenceState::warming_up();
    }
    let Some(cuts) = ScaleCuts::from_legs(graph.iter(), config.scale_percentiles) else {
        return ReferenceState::default();
    };

    let eligible: Vec<(&Leg, Scale)> = graph
        .iter()
        .filter(|leg| leg.deepest_retracement >= config.formation_fib)
        .map(|leg| (leg, cuts.classify(leg.range())))
        .filter(|(leg, scale)| !is_fatally_breached(leg, *scale, config))
        .collect();

    let max_range = eligible
        .iter()
        .map(|(leg, _)| leg.range())
        .fold(0.0_f64, f64::max);

    let mut references: Vec<ReferenceSwing> = eligible
        .iter()
        .map(|(leg, scale)| ReferenceSwing {
            leg_id: leg.id.clone(),
            direction: leg.direction,
            scale: *scale,
            location: leg.frame().ratio(bar.close),
            salience_score: salience(leg, max_range, bar.index, config),
            range: leg.range(),
            origin_price: leg.origin_price,
            pivot_price: leg.pivot_price,
            depth: leg.depth,
        })
        .collect();

    references.sort_by(|a, b| {
        b.salience_score
            .partial_cmp(&a.salience_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.leg_id.cmp(&b.leg_id))
    });

    let mut by_scale: BTreeMap<Scale, Vec<LegId>> = BTreeMap::new();
    let mut by_direction: PerDirection<Vec<LegId>> = PerDirection::default();
    for reference in &references {
        by_scale
            .entry(reference.scale)
            .or_default()
            .push(reference.leg_id.clone());
        by_direction
            .get_mut(reference.direction)
            .push(reference.leg_id.clone());
    }

    let bull = by_direction.bull.len() as f64;
    let bear = by_direction.bear.len() as f64;
    let direction_imbalance = if bull + bear > 0.0 {
        (bull - bear) / (bull + bear)
    } else {
        0.0
    };

    ReferenceState {
        references,
        by_scale,
        by_direction,
        direction_imbalance,
        warming_up: false,
    }
}

/// Origin overrun, or pivot breached past the scale's wick or close tolerance
fn is_fatally_breached(leg: &Leg, scale: Scale, config: &ReferenceConfig) -> bool {
    if !leg.is_origin_intact() {
        return true;
    }
    let range = leg.range();
    if range <= 0.0 {
        return true;
    }

    let (wick_tolerance, close_tolerance) = if scale.is_big() {
        (config.big_wick_tolerance, config.big_close_tolerance)
    } else {
        (config.small_wick_tolerance, config.small_close_tolerance)
    };

    let wick = leg.max_pivot_breach.is_some_and(|b| b / range > wick_tolerance);
    let close = leg
        .max_pivot_close_breach
        .is_some_and(|b| b / range > close_tolerance);
    wick || close
}

fn salience(leg: &Leg, max_range: f64, bar_index: u64, config: &ReferenceConfig) -> f64 {
    if config.standalone_salience {
        let counter = leg
            .max_counter_leg_range
            .value()
            .unwrap_or(0.0)
            .max(leg.counter_trend_range());
        return leg.range() * counter;
    }

    let weights = &config.weights;
    let range_term = if max_range > 0.0 {
        leg.range() / max_range
    } else {
        0.0
    };
    let impulse_term = leg
        .impulsiveness
        .map_or(NEUTRAL_IMPULSE, |percentile| percentile / 100.0);
    let age = bar_index.saturating_sub(leg.pivot_index) as f64;
    let recency_term = 1.0 / (1.0 + age / config.recency_half_life);
    let depth_term = 1.0 / (1.0 + leg.depth as f64);

    weights.range * range_term
        + weights.impulse * impulse_term
        + weights.recency * recency_term
        + weights.depth * depth_term
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leg::CounterRange;
    use crate::types::PricePoint;

    fn formed_leg(direction: Direction, origin: (f64, u64), pivot: (f64, u64)) -> Leg {
        let origin = PricePoint::new(origin.0, origin.1);
        let mut leg = Leg::new(
            LegId::derive(direction, origin),
            direction,
            origin,
            PricePoint::new(pivot.0, pivot.1),
            pivot.1,
        );
        leg.formed = true;
        leg.deepest_retracement = 0.5;
        leg
    }

    fn config() -> ReferenceConfig {
        ReferenceConfig {
            min_formed_legs: 2,
            ..ReferenceConfig::default()
        }
    }

    fn sample_graph() -> LegGraph {
        let mut graph = LegGraph::new();
        // Ranges 10, 20, 30, 40, 50
        for (i, range) in [10.0, 20.0, 30.0, 40.0, 50.0].iter().enumerate() {
            let start = i as u64 * 10;
            let direction = if i % 2 == 0 { Direction::Bull } else { Direction::Bear };
            let origin = 100.0;
            let pivot = origin + direction.sign() * range;
            graph
                .insert(formed_leg(direction, (origin, start), (pivot, start + 5)))
                .unwrap();
        }
        graph
    }

    fn last_bar() -> Bar {
        Bar::new(60, 60, 100.0, 101.0, 99.0, 100.0)
    }

    #[test]
    fn test_cold_start() {
        let graph = sample_graph();
        let bar = last_bar();
        let state = evaluate(&graph, 1, Some(&bar), &config());
        assert!(state.warming_up);
        assert!(state.is_empty());

        let disabled = ReferenceConfig {
            enabled: false,
            ..config()
        };
        assert!(evaluate(&graph, 100, Some(&bar), &disabled).warming_up);
    }

    #[test]
    fn test_scale_cuts() {
        let graph = sample_graph();
        let cuts = ScaleCuts::from_legs(graph.iter(), [0.4, 0.7, 0.9]).unwrap();
        // sorted [10, 20, 30, 40, 50]: m = idx 2, l = idx 3, xl = idx 4
        assert_eq!(cuts.classify(10.0), Scale::S);
        assert_eq!(cuts.classify(30.0), Scale::M);
        assert_eq!(cuts.classify(40.0), Scale::L);
        assert_eq!(cuts.classify(50.0), Scale::Xl);
        assert!(ScaleCuts::from_legs(std::iter::empty(), [0.4, 0.7, 0.9]).is_none());
    }

    #[test]
    fn test_sorted_and_grouped() {
        let graph = sample_graph();
        let bar = last_bar();
        let state = evaluate(&graph, 5, Some(&bar), &config());

        assert!(!state.warming_up);
        assert_eq!(state.references.len(), 5);
        for pair in state.references.windows(2) {
            assert!(pair[0].salience_score >= pair[1].salience_score);
        }
        assert_eq!(state.by_direction.bull.len(), 3);
        assert_eq!(state.by_direction.bear.len(), 2);
        assert!((state.direction_imbalance - 0.2).abs() < 1e-12);
        assert_eq!(state.by_scale[&Scale::Xl].len(), 1);
    }

    #[test]
    fn test_location_is_frame_ratio_of_close() {
        let mut graph = LegGraph::new();
        graph
            .insert(formed_leg(Direction::Bull, (100.0, 1), (150.0, 5)))
            .unwrap();
        graph
            .insert(formed_leg(Direction::Bull, (90.0, 0), (140.0, 3)))
            .unwrap();
        let bar = Bar::new(10, 10, 125.0, 126.0, 124.0, 125.0);
        let state = evaluate(&graph, 2, Some(&bar), &config());
        let reference = state
            .references
            .iter()
            .find(|r| r.leg_id.as_str() == "bull_1_100")
            .unwrap();
        assert!((reference.location - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_shallow_and_breached_legs_excluded() {
        let mut graph = sample_graph();
        let ids = graph.ids();
        graph.get_mut(&ids[0]).unwrap().deepest_retracement = 0.2;
        graph.get_mut(&ids[1]).unwrap().max_origin_breach = Some(1.0);
        // Small scale, zero tolerance: any pivot breach is fatal
        let small = graph
            .iter()
            .find(|l| l.range() == 10.0)
            .map(|l| l.id.clone())
            .unwrap();
        graph.get_mut(&small).unwrap().max_pivot_breach = Some(0.1);

        let bar = last_bar();
        let state = evaluate(&graph, 5, Some(&bar), &config());
        assert!(state.references.iter().all(|r| r.leg_id != ids[0]));
        assert!(state.references.iter().all(|r| r.leg_id != ids[1]));
        assert!(state.references.iter().all(|r| r.leg_id != small));
    }

    #[test]
    fn test_big_legs_tolerate_small_breach() {
        let mut graph = sample_graph();
        let big = graph
            .iter()
            .find(|l| l.range() == 50.0)
            .map(|l| l.id.clone())
            .unwrap();
        // 5% of the range: inside the 15% wick tolerance of XL
        graph.get_mut(&big).unwrap().max_pivot_breach = Some(2.5);
        let bar = last_bar();
        let state = evaluate(&graph, 5, Some(&bar), &config());
        assert!(state.references.iter().any(|r| r.leg_id == big));
    }

    #[test]
    fn test_standalone_salience() {
        let mut graph = LegGraph::new();
        let mut a = formed_leg(Direction::Bull, (100.0, 1), (150.0, 5));
        a.max_counter_leg_range = CounterRange::Measured(10.0);
        let mut b = formed_leg(Direction::Bull, (90.0, 0), (120.0, 3));
        b.max_counter_leg_range = CounterRange::Measured(40.0);
        graph.insert(a).unwrap();
        graph.insert(b).unwrap();

        let config = ReferenceConfig {
            standalone_salience: true,
            ..config()
        };
        let bar = last_bar();
        let state = evaluate(&graph, 2, Some(&bar), &config);
        // 50 * 10 = 500 vs 30 * 40 = 1200
        assert_eq!(state.top().unwrap().leg_id.as_str(), "bull_0_90");
        assert_eq!(state.top().unwrap().salience_score, 1200.0);
    }
}
