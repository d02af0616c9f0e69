//! Deterministic bar stream generators for integration testing
//!
//! ## Guarantees
//!
//! ### Determinism
//! - All functions are pure (same input → same output)
//! - No randomness (every pattern is a closed-form function of the index)
//!
//! ### Integrity
//! - Indices and timestamps strictly increase
//! - Every bar satisfies `low <= min(open, close)` and `high >= max(open, close)`
//! - Each bar opens at the previous close, so streams have no gaps
//!
//! ### Traceability
//! - Parameters fully describe the shape of the output
//! - Used by unit tests, integration tests and benches alike

use super::bar;
use crate::types::Bar;
use std::f64::consts::TAU;

/// Wick added beyond the body, as a share of the body size
const WICK_FRACTION: f64 = 0.1;

/// Minimum wick so flat bars still have a range
const MIN_WICK: f64 = 0.01;

// =============================================================================
// Bar Construction
// =============================================================================

/// Build a bar from its open and close with symmetric deterministic wicks
pub fn body_bar(index: u64, open: f64, close: f64) -> Bar {
    let wick = (close - open).abs() * WICK_FRACTION + MIN_WICK;
    bar(index, open, open.max(close) + wick, open.min(close) - wick, close)
}

// =============================================================================
// Piecewise-Linear Streams
// =============================================================================

/// Zigzag stream: a seed bar, then each move spread over `bars_per_move` bars
///
/// Produces `1 + moves.len() * bars_per_move` bars (`bars_per_move` is
/// raised to 1 when zero). Positive moves rally, negative moves sell off.
pub fn zigzag_bars(
    start_index: u64,
    start_price: f64,
    moves: &[f64],
    bars_per_move: usize,
) -> Vec<Bar> {
    let steps = bars_per_move.max(1);
    let mut bars = Vec::with_capacity(1 + moves.len() * steps);
    let mut index = start_index;
    let mut close = start_price;
    bars.push(body_bar(index, close, close));

    for &delta in moves {
        let step = delta / steps as f64;
        for _ in 0..steps {
            index += 1;
            let open = close;
            close = open + step;
            bars.push(body_bar(index, open, close));
        }
    }
    bars
}

// =============================================================================
// Oscillating Streams
// =============================================================================

/// Sine wave closes around `base`
pub fn sine_bars(start_index: u64, count: usize, base: f64, amplitude: f64, period: f64) -> Vec<Bar> {
    let close_at = |i: usize| base + amplitude * (TAU * i as f64 / period).sin();
    (0..count)
        .map(|i| {
            let open = if i == 0 { close_at(0) } else { close_at(i - 1) };
            body_bar(start_index + i as u64, open, close_at(i))
        })
        .collect()
}

/// Two superimposed cycles on a slow drift
///
/// Nested swings at two scales make this the default history for
/// continuation proofs and benches.
pub fn nested_cycle_bars(count: usize) -> Vec<Bar> {
    let close_at = |i: usize| {
        let t = i as f64;
        1_000.0 + 0.05 * t + 40.0 * (TAU * t / 120.0).sin() + 12.0 * (TAU * t / 17.0).sin()
    };
    (0..count)
        .map(|i| {
            let open = if i == 0 { close_at(0) } else { close_at(i - 1) };
            body_bar(i as u64, open, close_at(i))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(bars: &[Bar]) {
        for pair in bars.windows(2) {
            assert_eq!(pair[1].index, pair[0].index + 1);
            assert!(pair[1].timestamp > pair[0].timestamp);
            assert_eq!(pair[1].open, pair[0].close);
        }
        for b in bars {
            assert!(b.high >= b.open.max(b.close));
            assert!(b.low <= b.open.min(b.close));
        }
    }

    #[test]
    fn test_zigzag_shape() {
        let bars = zigzag_bars(10, 100.0, &[10.0, -4.0], 2);
        assert_eq!(bars.len(), 5);
        assert_eq!(bars[0].index, 10);
        assert!((bars[2].close - 110.0).abs() < 1e-9);
        assert!((bars[4].close - 106.0).abs() < 1e-9);
        assert_well_formed(&bars);
    }

    #[test]
    fn test_zero_bars_per_move() {
        assert_eq!(zigzag_bars(0, 50.0, &[1.0, 2.0, 3.0], 0).len(), 4);
    }

    #[test]
    fn test_oscillators_are_well_formed() {
        assert_well_formed(&sine_bars(0, 200, 100.0, 10.0, 25.0));
        assert_well_formed(&nested_cycle_bars(500));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(nested_cycle_bars(64), nested_cycle_bars(64));
    }
}
