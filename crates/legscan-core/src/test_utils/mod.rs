//! Test utilities for consistent test data creation across the codebase
//!
//! Compiled for unit tests and, behind the `test-utils` feature, for other
//! crates' test suites.
//!
//! ## Module Organization
//!
//! - `mod.rs`: Small-scale builders and the hand-checked scenarios
//! - `generators.rs`: Deterministic bar streams for integration tests

pub mod generators; // Larger deterministic bar streams

use crate::types::Bar;

/// Timestamp spacing used by every builder (one minute in milliseconds)
pub const BAR_INTERVAL_MS: i64 = 60_000;

/// Creates a bar whose timestamp follows from its index
pub fn bar(index: u64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(
        index,
        index as i64 * BAR_INTERVAL_MS,
        open,
        high,
        low,
        close,
    )
}

/// Creates consecutive bars from `(open, high, low, close)` tuples
pub fn bars_from(start_index: u64, ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    ohlc.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| bar(start_index + i as u64, o, h, l, c))
        .collect()
}

/// Hand-checked bar sequences with known outcomes
pub mod scenarios {
    use super::bars_from;
    use crate::types::Bar;

    /// Bull leg 100 -> 150 that forms on bar 4 and then recovers
    ///
    /// - bar 1 creates `bull_0_100`
    /// - bar 3 retraces to 0.36 (not formed)
    /// - bar 4 retraces to 0.62 (formed)
    pub fn bull_formation() -> Vec<Bar> {
        bars_from(
            0,
            &[
                (100.0, 102.0, 100.0, 101.0),
                (101.0, 120.0, 101.0, 119.0),
                (136.0, 150.0, 135.0, 149.0),
                (149.0, 149.0, 132.0, 133.0),
                (133.0, 133.0, 119.0, 120.0),
                (126.0, 140.0, 125.0, 139.0),
                (139.0, 149.0, 138.0, 148.0),
            ],
        )
    }

    /// Bear leg 150 -> 100 formed at a 0.5 retracement (bars 0..=3)
    ///
    /// Callers append either a breach below 100 or a rally to 200.
    pub fn bear_formation() -> Vec<Bar> {
        bars_from(
            0,
            &[
                (148.0, 150.0, 147.0, 148.0),
                (148.0, 149.0, 120.0, 121.0),
                (121.0, 121.0, 100.0, 101.0),
                (101.0, 125.0, 101.0, 124.0),
            ],
        )
    }

    /// [`bear_formation`] followed by a wick just beyond the pivot
    pub fn bear_pivot_breach() -> Vec<Bar> {
        let mut bars = bear_formation();
        bars.extend(bars_from(4, &[(124.0, 124.0, 99.5, 110.0)]));
        bars
    }

    /// [`bear_formation`] followed by a rally through the 2.0 level
    pub fn bear_completion() -> Vec<Bar> {
        let mut bars = bear_formation();
        bars.extend(bars_from(
            4,
            &[
                (124.0, 150.0, 120.0, 149.0),
                (149.0, 180.0, 149.0, 179.0),
                (179.0, 200.0, 179.0, 199.0),
            ],
        ));
        bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_timestamps_follow_index() {
        let bars = bars_from(3, &[(1.0, 2.0, 0.5, 1.5), (1.5, 2.5, 1.0, 2.0)]);
        assert_eq!(bars[0].index, 3);
        assert_eq!(bars[1].timestamp - bars[0].timestamp, BAR_INTERVAL_MS);
    }

    #[test]
    fn test_scenarios_are_consistent_bars() {
        for bars in [
            scenarios::bull_formation(),
            scenarios::bear_pivot_breach(),
            scenarios::bear_completion(),
        ] {
            for b in &bars {
                assert!(b.high >= b.open.max(b.close), "bar {}", b.index);
                assert!(b.low <= b.open.min(b.close), "bar {}", b.index);
            }
        }
    }
}
