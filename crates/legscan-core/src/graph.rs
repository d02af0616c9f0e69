//! Leg arena keyed by deterministic ids
//!
//! Parent links are ids, so reparenting is a field write and the whole
//! graph serializes as a plain map. Iteration order is the id order of the
//! underlying `BTreeMap`, which keeps every pass over the graph
//! deterministic across runs and restores.

use crate::errors::InternalInvariantError;
use crate::leg::{CounterRange, Leg, LegId, SegmentSnapshot};
use crate::metrics;
use crate::types::{Direction, PerDirection, PricePoint};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegGraph {
    legs: BTreeMap<LegId, Leg>,
}

impl LegGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn get(&self, id: &LegId) -> Option<&Leg> {
        self.legs.get(id)
    }

    pub fn get_mut(&mut self, id: &LegId) -> Option<&mut Leg> {
        self.legs.get_mut(id)
    }

    pub fn contains(&self, id: &LegId) -> bool {
        self.legs.contains_key(id)
    }

    /// Legs in id order
    pub fn iter(&self) -> impl Iterator<Item = &Leg> {
        self.legs.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Leg> {
        self.legs.values_mut()
    }

    pub fn ids(&self) -> Vec<LegId> {
        self.legs.keys().cloned().collect()
    }

    pub fn insert(&mut self, leg: Leg) -> Result<(), InternalInvariantError> {
        if self.legs.contains_key(&leg.id) {
            return Err(InternalInvariantError::DuplicateLeg {
                leg_id: leg.id.to_string(),
            });
        }
        self.legs.insert(leg.id.clone(), leg);
        Ok(())
    }

    /// Remove a leg, handing its children to its own parent (or making them roots)
    pub fn remove(&mut self, id: &LegId) -> Result<Leg, InternalInvariantError> {
        let removed = self
            .legs
            .remove(id)
            .ok_or_else(|| InternalInvariantError::MissingLeg {
                leg_id: id.to_string(),
            })?;

        let children = self.children_of(id);
        for child in &children {
            if let Some(leg) = self.legs.get_mut(child) {
                leg.parent_leg_id = removed.parent_leg_id.clone();
            }
        }
        for child in &children {
            self.refresh_depths(child)?;
        }

        Ok(removed)
    }

    pub fn children_of(&self, id: &LegId) -> Vec<LegId> {
        self.legs
            .values()
            .filter(|leg| leg.parent_leg_id.as_ref() == Some(id))
            .map(|leg| leg.id.clone())
            .collect()
    }

    /// Live legs of `direction` starting at exactly `origin`
    pub fn same_origin(
        &self,
        direction: Direction,
        origin: PricePoint,
    ) -> impl Iterator<Item = &Leg> {
        self.legs.values().filter(move |leg| {
            leg.direction == direction
                && leg.origin_index == origin.index
                && leg.origin_price == origin.price
        })
    }

    /// Tightest same-direction leg whose price range strictly contains `origin`
    ///
    /// Only legs that started before `origin` qualify. Ties on range go to the
    /// deeper leg, then to the smaller id.
    pub fn find_parent(&self, direction: Direction, origin: PricePoint) -> Option<&Leg> {
        self.legs
            .values()
            .filter(|leg| {
                leg.direction == direction
                    && leg.origin_index < origin.index
                    && direction.beyond(origin.price, leg.origin_price)
                    && direction.beyond(leg.pivot_price, origin.price)
            })
            .min_by(|a, b| {
                a.range()
                    .partial_cmp(&b.range())
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.depth.cmp(&a.depth))
                    .then_with(|| a.id.cmp(&b.id))
            })
    }

    /// Counter-trend available at `origin` relative to its would-be parent
    /// passes the branch-ratio floor
    ///
    /// Roots and children of parents without counter-trend always pass.
    pub fn branch_ratio_allows(
        &self,
        direction: Direction,
        origin: PricePoint,
        min_branch_ratio: f64,
    ) -> bool {
        if min_branch_ratio <= 0.0 {
            return true;
        }
        let Some(parent) = self.find_parent(direction, origin) else {
            return true;
        };
        let parent_counter = parent.counter_trend_range();
        if parent_counter <= 0.0 {
            return true;
        }
        let candidate_counter = (parent.pivot_price - origin.price).abs();
        candidate_counter >= min_branch_ratio * parent_counter
    }

    /// Largest opposite leg whose pivot is exactly `origin`
    pub fn measure_counter_range(
        &self,
        direction: Direction,
        origin: PricePoint,
        opposite_ever_created: bool,
    ) -> CounterRange {
        let opposite = direction.opposite();
        let best = self
            .legs
            .values()
            .filter(|leg| {
                leg.direction == opposite
                    && leg.pivot_index == origin.index
                    && leg.pivot_price == origin.price
            })
            .map(Leg::range)
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))));

        match best {
            Some(range) if range > 0.0 => CounterRange::Measured(range),
            Some(_) => CounterRange::Zero,
            None if opposite_ever_created => CounterRange::Zero,
            None => CounterRange::Unknown,
        }
    }

    /// Id for a new leg; siblings from a shared origin get the pivot index appended
    pub fn unique_id(&self, direction: Direction, origin: PricePoint, pivot_index: u64) -> LegId {
        let base = LegId::derive(direction, origin);
        if self.legs.contains_key(&base) {
            base.with_pivot(pivot_index)
        } else {
            base
        }
    }

    /// Create and insert a leg from `origin` to `pivot`
    ///
    /// Parent, depth, counter range and segment snapshot are derived from the
    /// graph as it stands before the insert.
    pub fn spawn(
        &mut self,
        direction: Direction,
        origin: PricePoint,
        pivot: PricePoint,
        bar_index: u64,
        ever_created: &PerDirection<bool>,
    ) -> Result<LegId, InternalInvariantError> {
        let id = self.unique_id(direction, origin, pivot.index);
        if origin.index >= pivot.index {
            return Err(InternalInvariantError::CausalOrder {
                leg_id: id.to_string(),
                origin_index: origin.index,
                pivot_index: pivot.index,
            });
        }

        let mut leg = Leg::new(id.clone(), direction, origin, pivot, bar_index);
        leg.max_counter_leg_range =
            self.measure_counter_range(direction, origin, *ever_created.get(direction.opposite()));

        if let Some(parent) = self.find_parent(direction, origin) {
            leg.parent_leg_id = Some(parent.id.clone());
            leg.depth = parent.depth + 1;
            leg.segment = Some(segment_snapshot(parent, origin));
        }

        self.insert(leg)?;
        Ok(id)
    }

    /// Check causal order, parent links and cached depths of every leg
    pub fn validate(&self) -> Result<(), InternalInvariantError> {
        for leg in self.legs.values() {
            if leg.origin_index >= leg.pivot_index {
                return Err(InternalInvariantError::CausalOrder {
                    leg_id: leg.id.to_string(),
                    origin_index: leg.origin_index,
                    pivot_index: leg.pivot_index,
                });
            }

            let expected_depth = match &leg.parent_leg_id {
                None => 0,
                Some(parent_id) => match self.legs.get(parent_id) {
                    Some(parent) => parent.depth + 1,
                    None => {
                        return Err(InternalInvariantError::DanglingParent {
                            leg_id: leg.id.to_string(),
                            parent_id: parent_id.to_string(),
                        })
                    }
                },
            };

            if leg.depth != expected_depth {
                return Err(InternalInvariantError::DepthMismatch {
                    leg_id: leg.id.to_string(),
                    cached: leg.depth,
                    actual: expected_depth,
                });
            }
        }
        Ok(())
    }

    /// Recompute cached depths for `root` and everything below it
    fn refresh_depths(&mut self, root: &LegId) -> Result<(), InternalInvariantError> {
        let mut stack = vec![root.clone()];
        // Bounded walk: a parent cycle would otherwise spin forever
        let mut budget = self.legs.len();

        while let Some(id) = stack.pop() {
            if budget == 0 {
                return Err(InternalInvariantError::DepthMismatch {
                    leg_id: id.to_string(),
                    cached: 0,
                    actual: 0,
                });
            }
            budget -= 1;

            let parent_depth = match self.legs.get(&id).and_then(|l| l.parent_leg_id.as_ref()) {
                None => None,
                Some(parent_id) => Some(
                    self.legs
                        .get(parent_id)
                        .map(|p| p.depth)
                        .ok_or_else(|| InternalInvariantError::DanglingParent {
                            leg_id: id.to_string(),
                            parent_id: parent_id.to_string(),
                        })?,
                ),
            };

            if let Some(leg) = self.legs.get_mut(&id) {
                leg.depth = parent_depth.map_or(0, |d| d + 1);
            }
            stack.extend(self.children_of(&id));
        }
        Ok(())
    }
}

fn segment_snapshot(parent: &Leg, child_origin: PricePoint) -> SegmentSnapshot {
    SegmentSnapshot {
        deepest_price: parent.pivot_price,
        deepest_index: parent.pivot_index,
        impulse_to_deepest: metrics::impulse(parent.range(), parent.duration()),
        impulse_back: metrics::impulse(
            (parent.pivot_price - child_origin.price).abs(),
            child_origin.index.saturating_sub(parent.pivot_index),
        ),
    }
}
