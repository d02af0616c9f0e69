//! Type definitions shared across the detector
//!
//! Bars are the only input; directions and bar classes are derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trend direction of a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Origin at a low, pivot at a higher high
    Bull,
    /// Origin at a high, pivot at a lower low
    Bear,
}

impl Direction {
    /// Both directions in canonical (bull first) order
    pub const BOTH: [Direction; 2] = [Direction::Bull, Direction::Bear];

    /// The counter-trend direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::Bull => Direction::Bear,
            Direction::Bear => Direction::Bull,
        }
    }

    /// +1.0 for bull, -1.0 for bear
    pub fn sign(self) -> f64 {
        match self {
            Direction::Bull => 1.0,
            Direction::Bear => -1.0,
        }
    }

    /// True when `price` lies strictly further than `reference` in this direction
    #[inline]
    pub fn beyond(self, price: f64, reference: f64) -> bool {
        self.excess(price, reference) > 0.0
    }

    /// Signed distance of `price` past `reference` in this direction
    #[inline]
    pub fn excess(self, price: f64, reference: f64) -> f64 {
        (price - reference) * self.sign()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bull => f.write_str("bull"),
            Direction::Bear => f.write_str("bear"),
        }
    }
}

/// A value kept once per direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerDirection<T> {
    pub bull: T,
    pub bear: T,
}

impl<T> PerDirection<T> {
    pub fn new(bull: T, bear: T) -> Self {
        Self { bull, bear }
    }

    pub fn get(&self, direction: Direction) -> &T {
        match direction {
            Direction::Bull => &self.bull,
            Direction::Bear => &self.bear,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut T {
        match direction {
            Direction::Bull => &mut self.bull,
            Direction::Bear => &mut self.bear,
        }
    }
}

impl<T: Clone> PerDirection<T> {
    /// Same value for both directions
    pub fn splat(value: T) -> Self {
        Self {
            bull: value.clone(),
            bear: value,
        }
    }
}

/// A price observed at a bar index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub index: u64,
}

impl PricePoint {
    pub fn new(price: f64, index: u64) -> Self {
        Self { price, index }
    }
}

/// OHLC bar, immutable once ingested
///
/// Bars must arrive with strictly increasing `index` and `timestamp`;
/// the detector rejects anything else before touching its state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Sequence number of the bar in its stream
    pub index: u64,

    /// Bar open time (unit chosen by the caller, only ordering matters)
    pub timestamp: i64,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(index: u64, timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            index,
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    /// Extreme reached in the trend direction (high for bull, low for bear)
    #[inline]
    pub fn extreme(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Bull => self.high,
            Direction::Bear => self.low,
        }
    }

    /// Extreme reached against the trend direction (low for bull, high for bear)
    #[inline]
    pub fn adverse(&self, direction: Direction) -> f64 {
        self.extreme(direction.opposite())
    }

    /// High minus low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Classification of a bar against its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarType {
    /// High not above and low not below the previous bar
    Inside,
    /// Higher high and lower low
    Outside,
    /// Higher high without a lower low (bull-favoring)
    HigherHighHigherLow,
    /// No higher high, lower low or equal high (bear-favoring)
    LowerHighLowerLow,
}

impl BarType {
    /// Direction whose legs may be created on this bar
    pub fn favored_direction(self) -> Option<Direction> {
        match self {
            BarType::HigherHighHigherLow => Some(Direction::Bull),
            BarType::LowerHighLowerLow => Some(Direction::Bear),
            BarType::Inside | BarType::Outside => None,
        }
    }

    pub fn favors(self, direction: Direction) -> bool {
        self.favored_direction() == Some(direction)
    }

    /// True when the bar favors the direction opposite to `direction`
    pub fn turns_against(self, direction: Direction) -> bool {
        self.favors(direction.opposite())
    }

    /// True when the bar reaches a new extreme in `direction`
    pub fn extends(self, direction: Direction) -> bool {
        self == BarType::Outside || self.favors(direction)
    }
}

impl fmt::Display for BarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarType::Inside => "inside",
            BarType::Outside => "outside",
            BarType::HigherHighHigherLow => "higher_high_higher_low",
            BarType::LowerHighLowerLow => "lower_high_lower_low",
        };
        f.write_str(name)
    }
}
