//! Checkpoint Continuation Proof
//!
//! Proves that pausing a detector, serializing its state, and resuming from
//! the deserialized snapshot is indistinguishable from one uninterrupted run:
//!
//! 1. Events after the split equal the uninterrupted run's events after the split
//! 2. The final states are identical
//! 3. This holds at every split point, including before the first bar

use legscan_core::test_utils::generators::{nested_cycle_bars, zigzag_bars};
use legscan_core::{Bar, Detector, DetectorConfig, DetectorState, Event};

fn run(config: &DetectorConfig, bars: &[Bar]) -> (Vec<Vec<Event>>, DetectorState) {
    let mut detector = Detector::new(config.clone()).unwrap();
    let per_bar = bars
        .iter()
        .map(|bar| detector.process_bar(*bar).unwrap())
        .collect();
    (per_bar, detector.into_state())
}

fn resume_at(config: &DetectorConfig, bars: &[Bar], split: usize) -> (Vec<Event>, DetectorState) {
    let (_, paused) = run(config, &bars[..split]);
    let json = serde_json::to_string(&paused).unwrap();
    let restored: DetectorState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, paused, "snapshot must survive JSON exactly");

    let mut detector = Detector::from_state(restored).unwrap();
    let mut events = Vec::new();
    for bar in &bars[split..] {
        events.extend(detector.process_bar(*bar).unwrap());
    }
    (events, detector.into_state())
}

fn assert_continuation(config: &DetectorConfig, bars: &[Bar], splits: impl Iterator<Item = usize>) {
    let (per_bar, full_state) = run(config, bars);

    for split in splits {
        let expected: Vec<Event> = per_bar[split..].iter().flatten().cloned().collect();
        let (events, state) = resume_at(config, bars, split);
        assert_eq!(events, expected, "events diverge after split at {split}");
        assert_eq!(state, full_state, "state diverges after split at {split}");
    }
}

#[test]
fn test_continuation_on_nested_cycles() {
    let bars = nested_cycle_bars(400);
    let config = DetectorConfig::default();
    assert_continuation(&config, &bars, (0..=bars.len()).step_by(37));
}

#[test]
fn test_continuation_at_every_split_of_short_stream() {
    let bars = zigzag_bars(0, 100.0, &[20.0, -12.0, 30.0, -25.0, 8.0, -40.0, 55.0], 3);
    let config = DetectorConfig::default();
    assert_continuation(&config, &bars, 0..=bars.len());
}

#[test]
fn test_continuation_with_all_strategies_enabled() {
    let bars = nested_cycle_bars(300);
    let mut config = DetectorConfig::default().with_max_turns_per_pivot(2);
    config.emit_level_crosses = true;
    assert_continuation(&config, &bars, [1, 150, 299].into_iter());
}

#[test]
fn test_continuation_without_optional_pruning() {
    let bars = nested_cycle_bars(250);
    let config = DetectorConfig::default().without_optional_pruning();
    assert_continuation(&config, &bars, [60, 125, 190].into_iter());
}

#[test]
fn test_two_runs_are_identical() {
    let bars = nested_cycle_bars(500);
    let config = DetectorConfig::default().with_min_turn_ratio(0.3);
    let (first_events, first_state) = run(&config, &bars);
    let (second_events, second_state) = run(&config, &bars);
    assert_eq!(first_events, second_events);
    assert_eq!(
        serde_json::to_string(&first_state).unwrap(),
        serde_json::to_string(&second_state).unwrap()
    );
}

#[test]
fn test_events_are_a_function_of_the_prefix() {
    // Appending bars never rewrites the events of earlier bars
    let bars = nested_cycle_bars(200);
    let config = DetectorConfig::default();
    let (full, _) = run(&config, &bars);
    for cut in [50, 120, 199] {
        let (prefix, _) = run(&config, &bars[..cut]);
        assert_eq!(prefix[..], full[..cut], "prefix {cut} diverges");
    }
}

#[test]
fn test_resumed_state_rejects_replayed_bar() {
    let bars = nested_cycle_bars(20);
    let (_, state) = run(&DetectorConfig::default(), &bars);
    let mut detector = Detector::from_state(state).unwrap();
    let last = bars[bars.len() - 1];
    assert!(detector.process_bar(last).is_err());
    assert!(!detector.verify_position(&last).is_acceptable());
}

#[test]
fn test_tampered_snapshot_is_rejected() {
    let bars = nested_cycle_bars(60);
    let (_, state) = run(&DetectorConfig::default(), &bars);
    let mut value = serde_json::to_value(&state).unwrap();
    value["formed_count"] = serde_json::json!(state.formed_count + 1);
    let tampered: DetectorState = serde_json::from_value(value).unwrap();
    assert!(Detector::from_state(tampered).is_err());
}
