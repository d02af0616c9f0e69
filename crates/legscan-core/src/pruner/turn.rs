//! Turn pruning: on a reversal bar, one leg per shared origin

use super::PruneContext;
use crate::graph::LegGraph;
use crate::leg::{Leg, LegId};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Legs of the direction the bar turned against that lose to a larger
/// same-origin leg (ties go to the smaller id)
pub fn select(graph: &LegGraph, ctx: &PruneContext<'_>) -> Vec<LegId> {
    let Some(favored) = ctx.bar_type.favored_direction() else {
        return Vec::new();
    };
    let direction = favored.opposite();

    let mut groups: BTreeMap<(u64, u64), SmallVec<[&Leg; 4]>> = BTreeMap::new();
    for leg in graph.iter().filter(|leg| leg.direction == direction) {
        groups
            .entry((leg.origin_index, leg.origin_price.to_bits()))
            .or_default()
            .push(leg);
    }

    let mut losers = Vec::new();
    for group in groups.values().filter(|group| group.len() > 1) {
        // Legs arrive in id order, so a strict comparison keeps the smallest id on ties
        let mut keep = group[0];
        for &leg in group.iter().skip(1) {
            if leg.range() > keep.range() {
                keep = leg;
            }
        }
        losers.extend(
            group
                .iter()
                .filter(|leg| leg.id != keep.id)
                .map(|leg| leg.id.clone()),
        );
    }
    losers
}
