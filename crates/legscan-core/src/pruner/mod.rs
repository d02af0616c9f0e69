//! Pruning pipeline
//!
//! Five strategies bound the leg graph. They run in a fixed order after
//! the per-bar updates and each one sees the graph as the previous left it:
//!
//! 1. [`turn`]: same-origin duplicates on a reversal bar
//! 2. [`proximity`]: near-identical origins sharing a pivot
//! 3. [`turn_ratio`]: weak counter legs at a newly formed leg's origin
//! 4. [`breach`]: engulfed legs and pivot breaches (with replacement)
//! 5. [`extension`]: legs whose origin was overrun by a multiple of their range
//!
//! Strategies select; this module removes. Every removal goes through
//! [`LegGraph::remove`], so children are always reparented.

pub mod breach;
pub mod extension;
pub mod proximity;
pub mod turn;
pub mod turn_ratio;

use crate::config::DetectorConfig;
use crate::errors::InternalInvariantError;
use crate::events::PruneReason;
use crate::graph::LegGraph;
use crate::leg::LegId;
use crate::types::{Bar, BarType, PerDirection};
use tracing::debug;

pub use breach::DeferredReplacement;

/// Inputs of one pruning pass
#[derive(Debug, Clone, Copy)]
pub struct PruneContext<'a> {
    pub bar: &'a Bar,
    pub bar_type: BarType,
    /// Legs that formed on this bar, in formation order
    pub newly_formed: &'a [LegId],
    pub config: &'a DetectorConfig,
}

/// One change made by the pipeline, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum PruneAction {
    Pruned(LegId, PruneReason),
    /// Replacement leg created by breach pruning
    Created(LegId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneOutcome {
    pub actions: Vec<PruneAction>,
}

impl PruneOutcome {
    pub fn pruned(&self) -> impl Iterator<Item = (&LegId, PruneReason)> {
        self.actions.iter().filter_map(|a| match a {
            PruneAction::Pruned(id, reason) => Some((id, *reason)),
            PruneAction::Created(_) => None,
        })
    }

    pub fn created(&self) -> impl Iterator<Item = &LegId> {
        self.actions.iter().filter_map(|a| match a {
            PruneAction::Created(id) => Some(id),
            PruneAction::Pruned(..) => None,
        })
    }
}

/// Run every enabled strategy in order
pub fn run(
    graph: &mut LegGraph,
    ctx: &PruneContext<'_>,
    ever_created: &mut PerDirection<bool>,
    deferred: &mut Vec<DeferredReplacement>,
) -> Result<PruneOutcome, InternalInvariantError> {
    let mut outcome = PruneOutcome::default();
    let config = ctx.config;

    let losers = turn::select(graph, ctx);
    remove_all(graph, ctx, losers, PruneReason::TurnPrune, &mut outcome)?;

    if config.origin_proximity.is_enabled() {
        let losers = proximity::select(graph, ctx);
        remove_all(graph, ctx, losers, PruneReason::OriginProximityPrune, &mut outcome)?;
    }

    if config.turn_ratio_enabled() && !ctx.newly_formed.is_empty() {
        let losers = turn_ratio::select(graph, ctx);
        remove_all(graph, ctx, losers, PruneReason::TurnRatioPrune, &mut outcome)?;
    }

    breach::apply(graph, ctx, ever_created, deferred, &mut outcome)?;

    if config.stale_extension_multiplier > 0.0 {
        let losers = extension::select(graph, ctx);
        remove_all(graph, ctx, losers, PruneReason::ExtensionPrune, &mut outcome)?;
    }

    Ok(outcome)
}

pub(crate) fn remove_one(
    graph: &mut LegGraph,
    ctx: &PruneContext<'_>,
    id: LegId,
    reason: PruneReason,
    outcome: &mut PruneOutcome,
) -> Result<(), InternalInvariantError> {
    graph.remove(&id)?;
    debug!(
        event_type = "leg_pruned",
        leg_id = %id,
        bar_index = ctx.bar.index,
        reason = %reason,
        "Leg pruned"
    );
    outcome.actions.push(PruneAction::Pruned(id, reason));
    Ok(())
}

fn remove_all(
    graph: &mut LegGraph,
    ctx: &PruneContext<'_>,
    ids: Vec<LegId>,
    reason: PruneReason,
    outcome: &mut PruneOutcome,
) -> Result<(), InternalInvariantError> {
    for id in ids {
        remove_one(graph, ctx, id, reason, outcome)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-built graphs for strategy tests

    use crate::graph::LegGraph;
    use crate::leg::{Leg, LegId};
    use crate::types::{Direction, PricePoint};

    pub fn leg(
        direction: Direction,
        origin: (f64, u64),
        pivot: (f64, u64),
    ) -> Leg {
        let origin = PricePoint::new(origin.0, origin.1);
        Leg::new(
            LegId::derive(direction, origin),
            direction,
            origin,
            PricePoint::new(pivot.0, pivot.1),
            pivot.1,
        )
    }

    /// Same as [`leg`] but with the sibling id form
    pub fn sibling(direction: Direction, origin: (f64, u64), pivot: (f64, u64)) -> Leg {
        let mut leg = leg(direction, origin, pivot);
        leg.id = leg.id.with_pivot(pivot.1);
        leg
    }

    pub fn graph_of(legs: Vec<Leg>) -> LegGraph {
        let mut graph = LegGraph::new();
        for leg in legs {
            graph.insert(leg).unwrap();
        }
        graph
    }
}
