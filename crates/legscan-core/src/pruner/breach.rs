//! Breach and engulfed pruning
//!
//! Engulfed legs (origin and pivot both breached) are deleted outright.
//! Otherwise a pivot breach beyond the direction's tolerance prunes the leg
//! and, while its origin holds, replaces it with a leg from the same origin
//! to the breach extreme. Legs are only created on bars favoring their
//! direction, so a breach on any other bar parks the replacement as a
//! [`DeferredReplacement`] until the next favoring bar.

use super::{remove_one, PruneAction, PruneContext, PruneOutcome};
use crate::errors::InternalInvariantError;
use crate::events::PruneReason;
use crate::graph::LegGraph;
use crate::types::{Bar, Direction, PerDirection, PricePoint};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Replacement leg waiting for a bar that favors its direction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeferredReplacement {
    pub direction: Direction,
    pub origin: PricePoint,
    /// Furthest price reached beyond the pruned pivot so far
    pub extreme: PricePoint,
}

impl DeferredReplacement {
    /// Follow a further extreme; false once the origin is traded through
    pub(crate) fn track(&mut self, bar: &Bar) -> bool {
        let direction = self.direction;
        if direction.opposite().excess(bar.adverse(direction), self.origin.price) > 0.0 {
            return false;
        }
        let extreme = bar.extreme(direction);
        if direction.beyond(extreme, self.extreme.price) {
            self.extreme = PricePoint::new(extreme, bar.index);
        }
        true
    }
}

pub fn apply(
    graph: &mut LegGraph,
    ctx: &PruneContext<'_>,
    ever_created: &mut PerDirection<bool>,
    deferred: &mut Vec<DeferredReplacement>,
    outcome: &mut PruneOutcome,
) -> Result<(), InternalInvariantError> {
    let config = ctx.config;

    for id in graph.ids() {
        let Some(leg) = graph.get(&id) else {
            continue;
        };

        if config.enable_engulfed_prune && leg.is_engulfed() {
            remove_one(graph, ctx, id, PruneReason::Engulfed, outcome)?;
            continue;
        }

        let Some(breach) = leg.max_pivot_breach else {
            continue;
        };
        let tolerance = *config.breach_tolerance.get(leg.direction);
        if breach <= tolerance * leg.range() {
            continue;
        }

        let direction = leg.direction;
        let origin = leg.origin();
        let replacement = if leg.is_origin_intact() {
            leg.breach_extreme
        } else {
            None
        };

        remove_one(graph, ctx, id, PruneReason::PivotBreach, outcome)?;

        if let Some(extreme) = replacement {
            if !ctx.bar_type.favors(direction) {
                defer(deferred, direction, origin, extreme);
                debug!(
                    event_type = "leg_replacement_deferred",
                    bar_index = ctx.bar.index,
                    direction = %direction,
                    bar_type = %ctx.bar_type,
                    pivot_price = extreme.price,
                    "Replacement waits for a favoring bar"
                );
            } else if needs_replacement(graph, direction, origin, extreme) {
                let new_id = graph.spawn(direction, origin, extreme, ctx.bar.index, ever_created)?;
                *ever_created.get_mut(direction) = true;
                debug!(
                    event_type = "leg_replaced",
                    leg_id = %new_id,
                    bar_index = ctx.bar.index,
                    pivot_price = extreme.price,
                    "Breached leg replaced from same origin"
                );
                outcome.actions.push(PruneAction::Created(new_id));
            }
        }
    }
    Ok(())
}

/// Park a replacement, merging with one already waiting on the same origin
fn defer(
    deferred: &mut Vec<DeferredReplacement>,
    direction: Direction,
    origin: PricePoint,
    extreme: PricePoint,
) {
    match deferred
        .iter_mut()
        .find(|d| d.direction == direction && d.origin == origin)
    {
        Some(waiting) => {
            if direction.beyond(extreme.price, waiting.extreme.price) {
                waiting.extreme = extreme;
            }
        }
        None => deferred.push(DeferredReplacement {
            direction,
            origin,
            extreme,
        }),
    }
}

/// No live leg from `origin` already reaches `extreme`
pub(crate) fn needs_replacement(
    graph: &LegGraph,
    direction: Direction,
    origin: PricePoint,
    extreme: PricePoint,
) -> bool {
    origin.index < extreme.index
        && !graph
            .same_origin(direction, origin)
            .any(|leg| !direction.beyond(extreme.price, leg.pivot_price))
}
