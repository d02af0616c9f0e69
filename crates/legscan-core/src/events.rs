//! Structural events emitted per bar
//!
//! Within one bar events come in processing order: creations first, then
//! state transitions of existing legs, then pruning.

use crate::frame::CrossDirection;
use crate::leg::LegId;
use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a leg left the active set without completing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneReason {
    TurnPrune,
    OriginProximityPrune,
    TurnRatioPrune,
    PivotBreach,
    Engulfed,
    ExtensionPrune,
}

impl PruneReason {
    pub fn as_str(self) -> &'static str {
        match self {
            PruneReason::TurnPrune => "turn_prune",
            PruneReason::OriginProximityPrune => "origin_proximity_prune",
            PruneReason::TurnRatioPrune => "turn_ratio_prune",
            PruneReason::PivotBreach => "pivot_breach",
            PruneReason::Engulfed => "engulfed",
            PruneReason::ExtensionPrune => "extension_prune",
        }
    }
}

impl fmt::Display for PruneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Ids derive from origin, so a leg pruned earlier in the same bar may
    /// be followed by a new leg carrying its id
    LegCreated {
        bar_index: u64,
        leg_id: LegId,
        direction: Direction,
        origin_price: f64,
        origin_index: u64,
        pivot_price: f64,
        pivot_index: u64,
        parent_leg_id: Option<LegId>,
    },

    LegPruned {
        bar_index: u64,
        leg_id: LegId,
        reason: PruneReason,
    },

    /// Origin traded through for the first time
    LegInvalidated {
        bar_index: u64,
        leg_id: LegId,
        breach: f64,
    },

    SwingFormed {
        bar_index: u64,
        leg_id: LegId,
        direction: Direction,
        retracement: f64,
    },

    /// Frozen pivot violated beyond its tolerance; `ratio` is breach / range
    SwingInvalidated {
        bar_index: u64,
        leg_id: LegId,
        ratio: f64,
    },

    SwingCompleted {
        bar_index: u64,
        leg_id: LegId,
    },

    LevelCross {
        bar_index: u64,
        leg_id: LegId,
        level: f64,
        crossing: CrossDirection,
    },
}

impl Event {
    pub fn bar_index(&self) -> u64 {
        match self {
            Event::LegCreated { bar_index, .. }
            | Event::LegPruned { bar_index, .. }
            | Event::LegInvalidated { bar_index, .. }
            | Event::SwingFormed { bar_index, .. }
            | Event::SwingInvalidated { bar_index, .. }
            | Event::SwingCompleted { bar_index, .. }
            | Event::LevelCross { bar_index, .. } => *bar_index,
        }
    }

    pub fn leg_id(&self) -> &LegId {
        match self {
            Event::LegCreated { leg_id, .. }
            | Event::LegPruned { leg_id, .. }
            | Event::LegInvalidated { leg_id, .. }
            | Event::SwingFormed { leg_id, .. }
            | Event::SwingInvalidated { leg_id, .. }
            | Event::SwingCompleted { leg_id, .. }
            | Event::LevelCross { leg_id, .. } => leg_id,
        }
    }

    /// Pruning reason, for `LegPruned` events
    pub fn prune_reason(&self) -> Option<PruneReason> {
        match self {
            Event::LegPruned { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
