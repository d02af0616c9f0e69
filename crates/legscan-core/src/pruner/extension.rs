//! Stale-extension pruning of legs whose origin was overrun

use super::PruneContext;
use crate::graph::LegGraph;
use crate::leg::LegId;

/// Breached legs whose worst origin breach exceeds `multiplier × range`
pub fn select(graph: &LegGraph, ctx: &PruneContext<'_>) -> Vec<LegId> {
    let multiplier = ctx.config.stale_extension_multiplier;
    graph
        .iter()
        .filter(|leg| {
            leg.max_origin_breach
                .is_some_and(|breach| breach > multiplier * leg.range())
        })
        .map(|leg| leg.id.clone())
        .collect()
}
