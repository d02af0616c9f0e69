//! Origin-proximity consolidation
//!
//! Legs sharing a pivot whose origins are close in both range and time are
//! clustered with union-find; each cluster keeps one survivor. Different
//! pivots are never compared.

use super::PruneContext;
use crate::config::{OriginProximityConfig, SurvivorStrategy};
use crate::graph::LegGraph;
use crate::leg::{Leg, LegId};
use crate::types::Direction;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub fn select(graph: &LegGraph, ctx: &PruneContext<'_>) -> Vec<LegId> {
    let proximity = &ctx.config.origin_proximity;

    let mut groups: BTreeMap<(Direction, u64, u64), SmallVec<[&Leg; 4]>> = BTreeMap::new();
    for leg in graph.iter() {
        groups
            .entry((leg.direction, leg.pivot_index, leg.pivot_price.to_bits()))
            .or_default()
            .push(leg);
    }

    let mut losers = Vec::new();
    for group in groups.values().filter(|group| group.len() > 1) {
        let mut clusters = DisjointSet::new(group.len());
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                if are_close(group[i], group[j], ctx.bar.index, proximity) {
                    clusters.union(i, j);
                }
            }
        }

        let mut members: BTreeMap<usize, SmallVec<[&Leg; 4]>> = BTreeMap::new();
        for (i, &leg) in group.iter().enumerate() {
            members.entry(clusters.find(i)).or_default().push(leg);
        }

        for cluster in members.values().filter(|c| c.len() > 1) {
            let Some(survivor) = pick_survivor(cluster, proximity.survivor) else {
                continue;
            };
            losers.extend(
                cluster
                    .iter()
                    .filter(|leg| leg.id != survivor.id)
                    .map(|leg| leg.id.clone()),
            );
        }
    }
    losers
}

/// Both enabled dimensions within threshold; a zero threshold ignores its dimension
fn are_close(a: &Leg, b: &Leg, bar_index: u64, proximity: &OriginProximityConfig) -> bool {
    let range_close = proximity.range_threshold <= 0.0 || {
        let largest = a.range().max(b.range());
        largest <= 0.0 || (a.range() - b.range()).abs() / largest <= proximity.range_threshold
    };

    let time_close = proximity.time_threshold <= 0.0 || {
        let age = bar_index
            .saturating_sub(a.origin_index)
            .max(bar_index.saturating_sub(b.origin_index));
        let gap = a.origin_index.abs_diff(b.origin_index);
        age == 0 || gap as f64 / age as f64 <= proximity.time_threshold
    };

    range_close && time_close
}

fn pick_survivor<'a>(cluster: &[&'a Leg], strategy: SurvivorStrategy) -> Option<&'a Leg> {
    let oldest_first = |a: &&Leg, b: &&Leg| {
        a.origin_index
            .cmp(&b.origin_index)
            .then_with(|| a.id.cmp(&b.id))
    };

    match strategy {
        SurvivorStrategy::Oldest => cluster.iter().copied().min_by(oldest_first),
        SurvivorStrategy::CounterTrend => cluster.iter().copied().min_by(|a, b| {
            b.counter_trend_range()
                .partial_cmp(&a.counter_trend_range())
                .unwrap_or(Ordering::Equal)
                .then_with(|| oldest_first(a, b))
        }),
    }
}

/// Union-find over group positions
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower position becomes the root so cluster keys are stable
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}
