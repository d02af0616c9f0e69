//! Incremental leg detector
//!
//! Consumes bars one at a time and keeps a self-pruning graph of legs.
//! Nothing here looks ahead: every decision made on bar `i` depends only on
//! bars `..=i`.
//!
//! Per bar, in order:
//!
//! 1. validate (rejections leave the state untouched)
//! 2. classify against the previous bar
//! 3. create legs on the favored direction (deferred breach replacements,
//!    pending origin, then siblings)
//! 4. extend unformed legs to new extremes
//! 5. track origin and pivot breaches, and the extremes of deferred replacements
//! 6. formation, pivot invalidation, level crosses, completion
//! 7. prune
//! 8. update metrics
//! 9. update pending origins

use crate::checkpoint::{DetectorState, PositionVerification};
use crate::classifier::classify;
use crate::config::DetectorConfig;
use crate::errors::{ConfigError, DataError, DetectorError, InternalInvariantError};
use crate::events::Event;
use crate::frame::FIB_LEVELS;
use crate::leg::{Leg, LegId};
use crate::metrics::percentile_value;
use crate::pruner::{self, PruneAction, PruneContext};
use crate::reference::{self, ReferenceState};
use crate::types::{Bar, BarType, Direction, PricePoint};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{debug, error, info, trace, warn};

/// Leg detector with a no-lookahead guarantee
#[derive(Debug, Clone)]
pub struct Detector {
    state: DetectorState,

    /// Set after an internal invariant broke; every later bar is refused
    poisoned: bool,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: DetectorState::new(config),
            poisoned: false,
        })
    }

    /// Resume from a snapshot taken with [`snapshot`](Self::snapshot)
    pub fn from_state(state: DetectorState) -> Result<Self, DetectorError> {
        state.validate()?;
        info!(
            event_type = "detector_restored",
            bars_processed = state.bars_processed,
            legs = state.legs.len(),
            last_index = ?state.last_bar.map(|b| b.index),
            "Detector restored from snapshot"
        );
        Ok(Self {
            state,
            poisoned: false,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.state.config
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn snapshot(&self) -> DetectorState {
        self.state.clone()
    }

    pub fn into_state(self) -> DetectorState {
        self.state
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn bars_processed(&self) -> u64 {
        self.state.bars_processed
    }

    /// Swap the configuration without touching the leg graph
    ///
    /// New thresholds apply from the next bar on. Use
    /// [`rebuild_from`](Self::rebuild_from) to replay history under them.
    pub fn set_config(&mut self, config: DetectorConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.state.config = config;
        Ok(())
    }

    /// Reset to an empty state under `config` and replay `bars`
    pub fn rebuild_from(
        &mut self,
        config: DetectorConfig,
        bars: &[Bar],
    ) -> Result<Vec<Event>, DetectorError> {
        config.validate()?;
        self.state = DetectorState::new(config);
        self.poisoned = false;

        let mut events = Vec::new();
        for bar in bars {
            events.extend(self.process_bar(*bar)?);
        }
        Ok(events)
    }

    pub fn verify_position(&self, bar: &Bar) -> PositionVerification {
        self.state.verify_position(bar)
    }

    /// Live legs in id order
    pub fn active_legs(&self) -> Vec<&Leg> {
        self.state.legs.iter().collect()
    }

    /// Formed legs in id order
    pub fn active_swings(&self) -> Vec<&Leg> {
        self.state.legs.iter().filter(|leg| leg.formed).collect()
    }

    pub fn leg(&self, id: &LegId) -> Option<&Leg> {
        self.state.legs.get(id)
    }

    pub fn reference_state(&self) -> ReferenceState {
        reference::evaluate(
            &self.state.legs,
            self.state.formed_count,
            self.state.last_bar.as_ref(),
            &self.state.config.reference,
        )
    }

    /// Process one bar and return the structural events it caused
    pub fn process_bar(&mut self, bar: Bar) -> Result<Vec<Event>, DetectorError> {
        if self.poisoned {
            return Err(InternalInvariantError::Poisoned.into());
        }

        if let Err(e) = self.validate_bar(&bar) {
            warn!(
                event_type = "bar_rejected",
                bar_index = bar.index,
                error = %e,
                "Bar rejected"
            );
            return Err(e.into());
        }

        match self.advance(&bar) {
            Ok(events) => Ok(events),
            Err(e) => {
                self.poisoned = true;
                error!(
                    event_type = "invariant_violation",
                    bar_index = bar.index,
                    error = %e,
                    "Internal invariant violated, detector poisoned"
                );
                Err(e.into())
            }
        }
    }

    fn validate_bar(&self, bar: &Bar) -> Result<(), DataError> {
        if let Some(last) = self.state.last_bar {
            match bar.index.cmp(&last.index) {
                Ordering::Less => {
                    return Err(DataError::OutOfOrderIndex {
                        last: last.index,
                        got: bar.index,
                    })
                }
                Ordering::Equal => return Err(DataError::DuplicateIndex { index: bar.index }),
                Ordering::Greater => {}
            }
            if bar.timestamp <= last.timestamp {
                return Err(DataError::NonMonotonicTimestamp {
                    index: bar.index,
                    last: last.timestamp,
                    got: bar.timestamp,
                });
            }
        }

        for (field, value) in [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ] {
            if !value.is_finite() {
                return Err(DataError::NonFinitePrice {
                    index: bar.index,
                    field,
                });
            }
        }

        let within = |p: f64| bar.low <= p && p <= bar.high;
        if bar.high < bar.low || !within(bar.open) || !within(bar.close) {
            return Err(DataError::InconsistentOhlc {
                index: bar.index,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
            });
        }

        Ok(())
    }

    fn advance(&mut self, bar: &Bar) -> Result<Vec<Event>, InternalInvariantError> {
        let previous = self.state.last_bar;
        let bar_type = classify(bar, previous.map(|b| (b.high, b.low)));
        let prev_close = previous.map(|b| b.close);
        trace!(bar_index = bar.index, bar_type = %bar_type, "Bar classified");

        let mut events = Vec::new();

        if let Some(direction) = bar_type.favored_direction() {
            self.create_deferred(direction, bar, &mut events)?;
            self.create_from_pending(direction, bar, &mut events)?;
            self.create_siblings(direction, bar, &mut events)?;
        }

        self.extend_legs(bar, bar_type);
        self.track_breaches(bar, &mut events);
        self.state
            .deferred_replacements
            .retain_mut(|waiting| waiting.track(bar));
        let newly_formed = self.update_lifecycle(bar, prev_close, &mut events)?;

        let ctx = PruneContext {
            bar,
            bar_type,
            newly_formed: &newly_formed,
            config: &self.state.config,
        };
        let outcome = pruner::run(
            &mut self.state.legs,
            &ctx,
            &mut self.state.leg_ever_created,
            &mut self.state.deferred_replacements,
        )?;
        for action in outcome.actions {
            match action {
                PruneAction::Pruned(leg_id, reason) => events.push(Event::LegPruned {
                    bar_index: bar.index,
                    leg_id,
                    reason,
                }),
                PruneAction::Created(leg_id) => {
                    let event = self.created_event(&leg_id, bar.index)?;
                    events.push(event);
                }
            }
        }

        self.update_metrics(prev_close, bar);
        self.update_pending_origins(bar, bar_type, previous.is_none());

        self.state.legs.validate()?;
        self.state.last_bar = Some(*bar);
        self.state.bars_processed += 1;

        Ok(events)
    }

    /// Breach replacements of `direction` parked on earlier bars
    fn create_deferred(
        &mut self,
        direction: Direction,
        bar: &Bar,
        events: &mut Vec<Event>,
    ) -> Result<(), InternalInvariantError> {
        let (ready, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.state.deferred_replacements)
                .into_iter()
                .partition(|d| d.direction == direction);
        self.state.deferred_replacements = waiting;

        for mut replacement in ready {
            if !replacement.track(bar) {
                continue;
            }
            let origin = replacement.origin;
            let pivot = replacement.extreme;
            if pruner::breach::needs_replacement(&self.state.legs, direction, origin, pivot) {
                self.spawn_leg(direction, origin, pivot, bar.index, events)?;
            }
        }
        Ok(())
    }

    /// New leg from the pending origin of `direction` to this bar's extreme
    fn create_from_pending(
        &mut self,
        direction: Direction,
        bar: &Bar,
        events: &mut Vec<Event>,
    ) -> Result<(), InternalInvariantError> {
        let Some(origin) = *self.state.pending_origins.get(direction) else {
            return Ok(());
        };
        let pivot = PricePoint::new(bar.extreme(direction), bar.index);
        if origin.index >= bar.index || !direction.beyond(pivot.price, origin.price) {
            return Ok(());
        }

        let min_branch_ratio = self.state.config.min_branch_ratio;
        if !self
            .state
            .legs
            .branch_ratio_allows(direction, origin, min_branch_ratio)
        {
            debug!(
                event_type = "leg_rejected",
                bar_index = bar.index,
                direction = %direction,
                origin_price = origin.price,
                origin_index = origin.index,
                "Candidate origin below branch ratio"
            );
            return Ok(());
        }

        self.spawn_leg(direction, origin, pivot, bar.index, events)?;
        *self.state.pending_origins.get_mut(direction) = None;
        Ok(())
    }

    /// Formed legs whose frozen pivot this bar exceeded continue as a new
    /// leg from the same origin
    fn create_siblings(
        &mut self,
        direction: Direction,
        bar: &Bar,
        events: &mut Vec<Event>,
    ) -> Result<(), InternalInvariantError> {
        let extreme = bar.extreme(direction);
        let mut seen = BTreeSet::new();
        let origins: Vec<PricePoint> = self
            .state
            .legs
            .iter()
            .filter(|leg| {
                leg.direction == direction
                    && leg.formed
                    && leg.is_origin_intact()
                    && direction.beyond(extreme, leg.pivot_price)
            })
            .map(Leg::origin)
            .filter(|origin| seen.insert((origin.index, origin.price.to_bits())))
            .collect();

        for origin in origins {
            let covered = self.state.legs.same_origin(direction, origin).any(|leg| {
                leg.is_extendable() || !direction.beyond(extreme, leg.pivot_price)
            });
            if covered {
                continue;
            }
            let pivot = PricePoint::new(extreme, bar.index);
            self.spawn_leg(direction, origin, pivot, bar.index, events)?;
        }
        Ok(())
    }

    fn spawn_leg(
        &mut self,
        direction: Direction,
        origin: PricePoint,
        pivot: PricePoint,
        bar_index: u64,
        events: &mut Vec<Event>,
    ) -> Result<LegId, InternalInvariantError> {
        let id = self.state.legs.spawn(
            direction,
            origin,
            pivot,
            bar_index,
            &self.state.leg_ever_created,
        )?;
        *self.state.leg_ever_created.get_mut(direction) = true;
        events.push(self.created_event(&id, bar_index)?);
        Ok(id)
    }

    fn created_event(&self, id: &LegId, bar_index: u64) -> Result<Event, InternalInvariantError> {
        let leg = self
            .state
            .legs
            .get(id)
            .ok_or_else(|| InternalInvariantError::MissingLeg {
                leg_id: id.to_string(),
            })?;
        debug!(
            event_type = "leg_created",
            leg_id = %leg.id,
            bar_index,
            parent = ?leg.parent_leg_id.as_ref().map(LegId::as_str),
            range = leg.range(),
            "Leg created"
        );
        Ok(Event::LegCreated {
            bar_index,
            leg_id: leg.id.clone(),
            direction: leg.direction,
            origin_price: leg.origin_price,
            origin_index: leg.origin_index,
            pivot_price: leg.pivot_price,
            pivot_index: leg.pivot_index,
            parent_leg_id: leg.parent_leg_id.clone(),
        })
    }

    fn extend_legs(&mut self, bar: &Bar, bar_type: BarType) {
        for leg in self.state.legs.iter_mut() {
            if !leg.is_extendable() || !bar_type.extends(leg.direction) {
                continue;
            }
            let extreme = bar.extreme(leg.direction);
            if leg.direction.beyond(extreme, leg.pivot_price) {
                leg.extend_to(PricePoint::new(extreme, bar.index));
            }
        }
    }

    fn track_breaches(&mut self, bar: &Bar, events: &mut Vec<Event>) {
        for leg in self.state.legs.iter_mut() {
            let direction = leg.direction;

            let origin_breach = direction
                .opposite()
                .excess(bar.adverse(direction), leg.origin_price);
            if origin_breach > 0.0 {
                match leg.max_origin_breach {
                    None => {
                        leg.max_origin_breach = Some(origin_breach);
                        debug!(
                            event_type = "leg_invalidated",
                            leg_id = %leg.id,
                            bar_index = bar.index,
                            breach = origin_breach,
                            "Leg origin breached"
                        );
                        events.push(Event::LegInvalidated {
                            bar_index: bar.index,
                            leg_id: leg.id.clone(),
                            breach: origin_breach,
                        });
                    }
                    Some(worst) if origin_breach > worst => {
                        leg.max_origin_breach = Some(origin_breach);
                    }
                    Some(_) => {}
                }
            }

            if !leg.formed {
                continue;
            }

            let extreme = bar.extreme(direction);
            let wick_breach = direction.excess(extreme, leg.pivot_price);
            if wick_breach > 0.0 && leg.max_pivot_breach.map_or(true, |w| wick_breach > w) {
                leg.max_pivot_breach = Some(wick_breach);
                leg.breach_extreme = Some(PricePoint::new(extreme, bar.index));
            }

            let close_breach = direction.excess(bar.close, leg.pivot_price);
            if close_breach > 0.0 && leg.max_pivot_close_breach.map_or(true, |w| close_breach > w)
            {
                leg.max_pivot_close_breach = Some(close_breach);
            }
        }
    }

    /// Range from which a leg counts as big, once enough legs are live
    fn big_swing_threshold(&self) -> Option<f64> {
        let config = &self.state.config;
        if self.state.legs.len() < config.big_swing_min_population {
            return None;
        }
        let mut ranges: Vec<f64> = self.state.legs.iter().map(Leg::range).collect();
        ranges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        percentile_value(&ranges, config.big_swing_percentile)
    }

    /// Formation, pivot invalidation, level crosses and completion
    ///
    /// Returns the ids of legs that formed on this bar.
    fn update_lifecycle(
        &mut self,
        bar: &Bar,
        prev_close: Option<f64>,
        events: &mut Vec<Event>,
    ) -> Result<Vec<LegId>, InternalInvariantError> {
        let big_threshold = self.big_swing_threshold();
        let DetectorState {
            config,
            legs,
            impulse_population,
            formed_count,
            ..
        } = &mut self.state;

        let mut newly_formed = Vec::new();
        let mut completed = Vec::new();

        for leg in legs.iter_mut() {
            let direction = leg.direction;
            let frame = leg.frame();

            // A pivot set on this very bar has no known retracement after it but the close
            let probe = if leg.pivot_index == bar.index {
                bar.close
            } else {
                bar.adverse(direction)
            };
            let retracement = frame.ratio(probe);
            if retracement > leg.deepest_retracement {
                leg.deepest_retracement = retracement;
            }

            if !leg.formed {
                if leg.is_origin_intact()
                    && frame.is_formed(probe, *config.formation_fib.get(direction))
                {
                    leg.formed = true;
                    leg.formed_at = Some(bar.index);
                    impulse_population.insert(leg.impulse);
                    *formed_count += 1;
                    leg.impulsiveness = impulse_population.percentile(leg.impulse);
                    debug!(
                        event_type = "swing_formed",
                        leg_id = %leg.id,
                        bar_index = bar.index,
                        retracement,
                        "Swing formed"
                    );
                    events.push(Event::SwingFormed {
                        bar_index: bar.index,
                        leg_id: leg.id.clone(),
                        direction,
                        retracement,
                    });
                    newly_formed.push(leg.id.clone());
                }
                continue;
            }

            let is_big = big_threshold.is_some_and(|threshold| leg.range() >= threshold);

            if !leg.pivot_violated {
                let extreme = bar.extreme(direction);
                let violated = if is_big {
                    frame.is_violated(extreme, config.big_swing_wick_tolerance)
                        || frame.is_violated(bar.close, config.big_swing_close_tolerance)
                } else {
                    frame.is_violated(extreme, 0.0)
                };
                if violated {
                    leg.pivot_violated = true;
                    let range = leg.range();
                    let ratio = if range > 0.0 {
                        leg.max_pivot_breach.unwrap_or(0.0) / range
                    } else {
                        0.0
                    };
                    debug!(
                        event_type = "swing_invalidated",
                        leg_id = %leg.id,
                        bar_index = bar.index,
                        ratio,
                        big = is_big,
                        "Swing pivot violated"
                    );
                    events.push(Event::SwingInvalidated {
                        bar_index: bar.index,
                        leg_id: leg.id.clone(),
                        ratio,
                    });
                }
            }

            if config.emit_level_crosses {
                if let Some(prev) = prev_close {
                    for (level, crossing) in frame.crossed_levels(prev, bar.close, &FIB_LEVELS) {
                        events.push(Event::LevelCross {
                            bar_index: bar.index,
                            leg_id: leg.id.clone(),
                            level,
                            crossing,
                        });
                    }
                }
            }

            if !is_big && !leg.pivot_violated && frame.is_completed(bar.adverse(direction)) {
                completed.push(leg.id.clone());
            }
        }

        for id in completed {
            legs.remove(&id)?;
            debug!(
                event_type = "swing_completed",
                leg_id = %id,
                bar_index = bar.index,
                "Swing completed"
            );
            events.push(Event::SwingCompleted {
                bar_index: bar.index,
                leg_id: id,
            });
        }

        Ok(newly_formed)
    }

    /// Spikiness moments and impulsiveness ranks of intact legs
    fn update_metrics(&mut self, prev_close: Option<f64>, bar: &Bar) {
        let DetectorState {
            legs,
            impulse_population,
            ..
        } = &mut self.state;

        for leg in legs.iter_mut().filter(|leg| leg.is_origin_intact()) {
            if let Some(prev) = prev_close {
                leg.moments.push(leg.direction.sign() * (bar.close - prev));
            }
            if leg.formed {
                leg.impulsiveness = impulse_population.percentile(leg.impulse);
            }
        }
    }

    /// Bear-side bars lower the bull origin candidate, bull-side bars raise
    /// the bear one; the first bar seeds both
    fn update_pending_origins(&mut self, bar: &Bar, bar_type: BarType, first: bool) {
        let pending = &mut self.state.pending_origins;
        let low = PricePoint::new(bar.low, bar.index);
        let high = PricePoint::new(bar.high, bar.index);

        if first {
            pending.bull = Some(low);
            pending.bear = Some(high);
            return;
        }

        if bar_type.extends(Direction::Bear) && pending.bull.map_or(true, |p| bar.low < p.price) {
            pending.bull = Some(low);
        }
        if bar_type.extends(Direction::Bull) && pending.bear.map_or(true, |p| bar.high > p.price) {
            pending.bear = Some(high);
        }
    }
}
