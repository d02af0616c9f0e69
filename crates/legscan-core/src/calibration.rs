//! Batch calibration over a bar history
//!
//! A thin loop over [`Detector::process_bar`] with optional progress
//! reporting; it adds no semantics of its own.

use crate::checkpoint::DetectorState;
use crate::config::DetectorConfig;
use crate::detector::Detector;
use crate::errors::DetectorError;
use crate::events::Event;
use crate::types::Bar;
use tracing::info;

/// Bars between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationProgress {
    pub processed: usize,
    pub total: usize,
    pub active_legs: usize,
    /// Events emitted so far
    pub events: usize,
}

impl CalibrationProgress {
    /// Share of bars processed, 1.0 for an empty run
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Run `bars` through a fresh detector
pub fn calibrate(
    bars: &[Bar],
    config: DetectorConfig,
    progress: Option<&mut dyn FnMut(CalibrationProgress)>,
) -> Result<(DetectorState, Vec<Event>), DetectorError> {
    calibrate_with_interval(bars, config, DEFAULT_PROGRESS_INTERVAL, progress)
}

/// [`calibrate`] with an explicit reporting interval (0 reports only at the end)
pub fn calibrate_with_interval(
    bars: &[Bar],
    config: DetectorConfig,
    interval: usize,
    mut progress: Option<&mut dyn FnMut(CalibrationProgress)>,
) -> Result<(DetectorState, Vec<Event>), DetectorError> {
    let mut detector = Detector::new(config)?;
    let total = bars.len();
    let mut events = Vec::new();

    info!(
        event_type = "calibration_start",
        total_bars = total,
        "Calibration started"
    );

    for (i, bar) in bars.iter().enumerate() {
        events.extend(detector.process_bar(*bar)?);

        let processed = i + 1;
        let due = interval > 0 && processed % interval == 0 && processed < total;
        if due {
            if let Some(report) = progress.as_deref_mut() {
                report(CalibrationProgress {
                    processed,
                    total,
                    active_legs: detector.state().legs.len(),
                    events: events.len(),
                });
            }
        }
    }

    let state = detector.into_state();
    if let Some(report) = progress.as_deref_mut() {
        report(CalibrationProgress {
            processed: total,
            total,
            active_legs: state.legs.len(),
            events: events.len(),
        });
    }

    info!(
        event_type = "calibration_complete",
        total_bars = total,
        active_legs = state.legs.len(),
        formed = state.formed_count,
        events = events.len(),
        "Calibration complete"
    );

    Ok((state, events))
}
