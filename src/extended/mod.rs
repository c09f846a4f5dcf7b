//! Moments together with distinct count and quantiles
//!
//! [`ExtendedAccumulator`] feeds every observation to a
//! [`MomentAccumulator`](crate::statistics::MomentAccumulator), a cardinality
//! estimator and a quantile estimator. The estimators are reached only through
//! [`CardinalityEstimator`] and [`QuantileEstimator`], so any implementation can
//! replace the default [`HyperLogLog`] and [`TDigest`].
//!
//! # Example
//!
//! ```
//! use opstats::extended::{aggregate_extended, ExtendedAccumulator};
//!
//! let mut left = ExtendedAccumulator::new();
//! let mut right = ExtendedAccumulator::new();
//! left.add_all([1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! right.add_all([6.0, 7.0, 8.0, 9.0, 10.0]).unwrap();
//!
//! let merged = aggregate_extended(&[left.get_parallel(), right.get_parallel()]).unwrap();
//! let result = merged.calculate();
//!
//! assert_eq!(result.count, 10);
//! assert_eq!(result.cardinality, 10);
//! assert!((result.mean - 5.5).abs() < 1e-12);
//! ```

mod accumulator;

pub use accumulator::{ExtendedAccumulator, ExtendedIntermediate, ExtendedResult};

use crate::aggregate::aggregate;
use crate::cardinality::{HyperLogLog, DEFAULT_ERROR_RATE};
use crate::quantiles::{TDigest, DEFAULT_COMPRESSION};
use crate::traits::{CardinalityEstimator, QuantileEstimator, StatsError};

/// Parameters of the default estimators
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtendedConfig {
    /// Target relative error of the distinct count
    pub error_rate: f64,
    /// t-digest compression
    pub compression: f64,
}

impl Default for ExtendedConfig {
    fn default() -> Self {
        Self {
            error_rate: DEFAULT_ERROR_RATE,
            compression: DEFAULT_COMPRESSION,
        }
    }
}

impl ExtendedConfig {
    /// Set the target relative error of the distinct count
    pub fn with_error_rate(mut self, error_rate: f64) -> Self {
        self.error_rate = error_rate;
        self
    }

    /// Set the t-digest compression
    pub fn with_compression(mut self, compression: f64) -> Self {
        self.compression = compression;
        self
    }

    /// Build the default estimators
    ///
    /// # Panics
    ///
    /// Panics if `compression` is not finite and positive.
    pub(crate) fn estimators(&self) -> (HyperLogLog, TDigest) {
        (
            HyperLogLog::with_error(self.error_rate),
            TDigest::new(self.compression),
        )
    }
}

/// Combine extended intermediates from disjoint partitions
///
/// Moments combine exactly and each sketch is merged by its own estimator.
/// Intermediates without observations are skipped, so an empty partition
/// never fails the reduction. Non-empty sketches built with different
/// parameters fail with [`StatsError::Merge`]. An empty slice is
/// [`StatsError::EmptyAggregation`].
pub fn aggregate_extended<C, Q>(
    intermediates: &[ExtendedIntermediate<C, Q>],
) -> Result<ExtendedIntermediate<C, Q>, StatsError>
where
    C: CardinalityEstimator,
    Q: QuantileEstimator,
{
    aggregate(intermediates)
}
