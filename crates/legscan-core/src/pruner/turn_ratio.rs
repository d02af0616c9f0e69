//! Turn-ratio pruning at shared pivots
//!
//! When a leg forms, the opposite legs whose pivot is that leg's origin are
//! compared by `max_counter_leg_range / range`. The largest of them is always
//! kept, and legs with an unknown counter range are exempt.

use super::PruneContext;
use crate::graph::LegGraph;
use crate::leg::{Leg, LegId};
use crate::types::PricePoint;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BTreeSet;

pub fn select(graph: &LegGraph, ctx: &PruneContext<'_>) -> Vec<LegId> {
    let mut seen_pivots: BTreeSet<(u64, u64)> = BTreeSet::new();
    let mut losers: BTreeSet<LegId> = BTreeSet::new();

    for formed_id in ctx.newly_formed {
        let Some(formed) = graph.get(formed_id) else {
            continue;
        };
        let pivot = formed.origin();
        if !seen_pivots.insert((pivot.index, pivot.price.to_bits())) {
            continue;
        }

        let counter_direction = formed.direction.opposite();
        let at_pivot: SmallVec<[&Leg; 8]> = graph
            .iter()
            .filter(|leg| leg.direction == counter_direction && pivots_at(leg, pivot))
            .collect();
        if at_pivot.len() < 2 {
            continue;
        }

        losers.extend(select_at_pivot(&at_pivot, ctx));
    }

    losers.into_iter().collect()
}

fn pivots_at(leg: &Leg, point: PricePoint) -> bool {
    leg.pivot_index == point.index && leg.pivot_price == point.price
}

/// Counter range relative to the leg's own range; `None` when exempt
pub fn turn_ratio(leg: &Leg) -> Option<f64> {
    let counter = leg.max_counter_leg_range.value()?;
    let range = leg.range();
    if range <= 0.0 {
        return None;
    }
    Some(counter / range)
}

fn select_at_pivot(legs: &[&Leg], ctx: &PruneContext<'_>) -> Vec<LegId> {
    // Largest leg at the pivot; ties to the smaller id (legs arrive in id order)
    let mut largest = legs[0];
    for &leg in legs.iter().skip(1) {
        if leg.range() > largest.range() {
            largest = leg;
        }
    }

    let mut candidates: SmallVec<[(&Leg, f64); 8]> = legs
        .iter()
        .filter(|leg| leg.id != largest.id)
        .filter_map(|leg| turn_ratio(leg).map(|ratio| (*leg, ratio)))
        .collect();

    let config = ctx.config;
    if let Some(min_ratio) = config.min_turn_ratio {
        return candidates
            .iter()
            .filter(|(_, ratio)| *ratio < min_ratio)
            .map(|(leg, _)| leg.id.clone())
            .collect();
    }

    if let Some(k) = config.max_turns_per_pivot {
        candidates.sort_by(|(a, ra), (b, rb)| {
            rb.partial_cmp(ra)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        return candidates
            .iter()
            .skip(k)
            .map(|(leg, _)| leg.id.clone())
            .collect();
    }

    Vec::new()
}
