//! Rating value range and aggregate fold.
//!
//! # Invariants
//! - Accepted rating values are `MIN_RATING..=MAX_RATING`.
//! - `mean` is only ever derived from (previous mean, previous count, new
//!   value); mean and count change together.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Rating input rejected before any aggregate is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingError {
    OutOfRange(i64),
}

impl Display for RatingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange(value) => write!(
                f,
                "rating must be between {MIN_RATING} and {MAX_RATING}, got {value}"
            ),
        }
    }
}

impl Error for RatingError {}

/// A rating that has passed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingValue(i64);

impl RatingValue {
    pub fn new(value: i64) -> Result<Self, RatingError> {
        if (MIN_RATING..=MAX_RATING).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RatingError::OutOfRange(value))
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// Running (mean, count) summary of every rating a program received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingAggregate {
    pub mean: f64,
    pub count: u64,
}

impl RatingAggregate {
    pub fn new(mean: f64, count: u64) -> Self {
        Self { mean, count }
    }

    /// Folds one rating into the aggregate.
    ///
    /// `new_mean = (mean * count + value) / (count + 1)`.
    pub fn fold(self, value: RatingValue) -> Self {
        let count = self.count as f64;
        Self {
            mean: (self.mean * count + value.get() as f64) / (count + 1.0),
            count: self.count + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RatingAggregate, RatingError, RatingValue};

    #[test]
    fn range_is_closed_one_to_five() {
        assert!(RatingValue::new(1).is_ok());
        assert!(RatingValue::new(5).is_ok());
        assert_eq!(RatingValue::new(0), Err(RatingError::OutOfRange(0)));
        assert_eq!(RatingValue::new(6), Err(RatingError::OutOfRange(6)));
    }

    #[test]
    fn fold_is_order_independent_for_small_batches() {
        let orders = [
            [5, 3, 4],
            [5, 4, 3],
            [3, 5, 4],
            [3, 4, 5],
            [4, 5, 3],
            [4, 3, 5],
        ];
        for order in orders {
            let aggregate = order.iter().fold(RatingAggregate::default(), |acc, value| {
                acc.fold(RatingValue::new(*value).unwrap())
            });
            assert_eq!(aggregate, RatingAggregate::new(4.0, 3), "order {order:?}");
        }
    }

    #[test]
    fn fold_extends_existing_aggregate() {
        let aggregate = RatingAggregate::new(4.5, 120).fold(RatingValue::new(5).unwrap());
        assert_eq!(aggregate.count, 121);
        assert!((aggregate.mean - 545.0 / 121.0).abs() < 1e-12);
    }
}
