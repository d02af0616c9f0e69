//! Bar classification against the previous bar's extremes

use crate::types::{Bar, BarType};

/// Classify `bar` given the previous bar's `(high, low)`.
///
/// The first bar of a stream has no predecessor and is `Inside` by convention.
/// An equal high with a lower low is bear-favoring; a higher high with an
/// equal low is bull-favoring.
pub fn classify(bar: &Bar, previous: Option<(f64, f64)>) -> BarType {
    let Some((prev_high, prev_low)) = previous else {
        return BarType::Inside;
    };

    let higher_high = bar.high > prev_high;
    let lower_low = bar.low < prev_low;

    match (higher_high, lower_low) {
        (true, true) => BarType::Outside,
        (true, false) => BarType::HigherHighHigherLow,
        (false, true) => BarType::LowerHighLowerLow,
        (false, false) => BarType::Inside,
    }
}
