//! Reference frame: price <-> swing-relative ratio
//!
//! `anchor0` is the defended extreme (ratio 0), `anchor1` the origin
//! extreme (ratio 1); ratio 2 is the completion target one full range past
//! the origin. The signed range carries the direction, so callers work in
//! ratio space and never branch on bull/bear.
//!
//! ```text
//! bull leg 100 -> 150:  price 150 = 0.0, 130.9 = 0.382, 100 = 1.0, 50 = 2.0
//! bear leg 150 -> 100:  price 100 = 0.0, 119.1 = 0.382, 150 = 1.0, 200 = 2.0
//! ```

use crate::types::Direction;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Ratio at which a swing counts as completed
pub const COMPLETION_RATIO: f64 = 2.0;

/// Fibonacci levels watched for level-cross events
pub const FIB_LEVELS: [f64; 10] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0, 1.272, 1.618, 2.0];

/// Direction of a level crossing in ratio space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDirection {
    /// Ratio increased through the level (away from the pivot)
    Up,
    /// Ratio decreased through the level (back toward the pivot)
    Down,
}

/// Stateless, direction-aware coordinate mapper
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFrame {
    anchor0: f64,
    anchor1: f64,
    direction: Direction,
}

impl ReferenceFrame {
    pub fn new(anchor0: f64, anchor1: f64, direction: Direction) -> Self {
        Self {
            anchor0,
            anchor1,
            direction,
        }
    }

    /// Defended extreme
    pub fn anchor0(&self) -> f64 {
        self.anchor0
    }

    /// Origin extreme
    pub fn anchor1(&self) -> f64 {
        self.anchor1
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Signed range: positive for bull legs, negative for bear legs
    pub fn range(&self) -> f64 {
        self.anchor0 - self.anchor1
    }

    /// Price to ratio. A degenerate frame maps everything to 0.
    pub fn ratio(&self, price: f64) -> f64 {
        let range = self.range();
        if range == 0.0 {
            return 0.0;
        }
        (self.anchor0 - price) / range
    }

    /// Ratio to price; exact inverse of [`ratio`](Self::ratio)
    pub fn price(&self, ratio: f64) -> f64 {
        self.anchor0 - ratio * self.range()
    }

    /// Price beyond the defended extreme by more than `tolerance` ranges
    pub fn is_violated(&self, price: f64, tolerance: f64) -> bool {
        self.ratio(price) < -tolerance
    }

    /// Price retraced at least `formation_fib` of the way toward the origin
    pub fn is_formed(&self, price: f64, formation_fib: f64) -> bool {
        self.ratio(price) >= formation_fib
    }

    pub fn is_completed(&self, price: f64) -> bool {
        self.ratio(price) >= COMPLETION_RATIO
    }

    /// Levels strictly crossed moving from `from_price` to `to_price`
    ///
    /// Landing exactly on a level counts as crossing it; leaving from
    /// exactly on a level in the same direction does not.
    pub fn crossed_levels(
        &self,
        from_price: f64,
        to_price: f64,
        levels: &[f64],
    ) -> SmallVec<[(f64, CrossDirection); 4]> {
        let from = self.ratio(from_price);
        let to = self.ratio(to_price);
        let mut crossed = SmallVec::new();

        if to > from {
            for &level in levels {
                if from < level && level <= to {
                    crossed.push((level, CrossDirection::Up));
                }
            }
        } else if to < from {
            for &level in levels.iter().rev() {
                if to <= level && level < from {
                    crossed.push((level, CrossDirection::Down));
                }
            }
        }

        crossed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bull_frame() -> ReferenceFrame {
        // bull leg origin 100, pivot 150
        ReferenceFrame::new(150.0, 100.0, Direction::Bull)
    }

    fn bear_frame() -> ReferenceFrame {
        // bear leg origin 150, pivot 100
        ReferenceFrame::new(100.0, 150.0, Direction::Bear)
    }

    #[test]
    fn test_range_sign_follows_direction() {
        assert_eq!(bull_frame().range(), 50.0);
        assert_eq!(bear_frame().range(), -50.0);
    }

    #[test]
    fn test_ratio_anchors() {
        for frame in [bull_frame(), bear_frame()] {
            assert_eq!(frame.ratio(frame.anchor0()), 0.0);
            assert_eq!(frame.ratio(frame.anchor1()), 1.0);
        }
        assert_eq!(bull_frame().ratio(50.0), 2.0);
        assert_eq!(bear_frame().ratio(200.0), 2.0);
    }

    #[test]
    fn test_ratio_price_inverse() {
        let frame = bear_frame();
        for ratio in [-0.5, 0.0, 0.382, 0.618, 1.0, 1.618, 2.0] {
            let price = frame.price(ratio);
            assert!((frame.ratio(price) - ratio).abs() < 1e-12);
        }
        assert!((bull_frame().ratio(119.0) - 0.62).abs() < 1e-12);
    }

    #[test]
    fn test_predicates() {
        let frame = bull_frame();
        assert!(frame.is_formed(130.9, 0.382));
        assert!(!frame.is_formed(131.0, 0.382));
        assert!(frame.is_violated(150.5, 0.0));
        assert!(!frame.is_violated(150.0, 0.0));
        assert!(!frame.is_violated(155.0, 0.15));
        assert!(frame.is_violated(158.0, 0.15));
        assert!(frame.is_completed(50.0));
        assert!(!frame.is_completed(50.5));
    }

    #[test]
    fn test_degenerate_frame() {
        let frame = ReferenceFrame::new(100.0, 100.0, Direction::Bull);
        assert_eq!(frame.ratio(123.0), 0.0);
        assert!(!frame.is_violated(200.0, 0.0));
    }

    #[test]
    fn test_crossed_levels_both_ways() {
        let frame = bear_frame();
        // 110 -> 125: ratio 0.2 -> 0.5
        let up = frame.crossed_levels(110.0, 125.0, &FIB_LEVELS);
        let levels: Vec<f64> = up.iter().map(|(l, _)| *l).collect();
        assert_eq!(levels, vec![0.236, 0.382, 0.5]);
        assert!(up.iter().all(|(_, d)| *d == CrossDirection::Up));

        // back down 125 -> 112: ratio 0.5 -> 0.24
        let down = frame.crossed_levels(125.0, 112.0, &FIB_LEVELS);
        let levels: Vec<f64> = down.iter().map(|(l, _)| *l).collect();
        assert_eq!(levels, vec![0.382]);
        assert_eq!(down[0].1, CrossDirection::Down);

        assert!(frame.crossed_levels(120.0, 120.0, &FIB_LEVELS).is_empty());
    }
}
