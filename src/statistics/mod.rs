//! Online moments and covariance for streaming data
//!
//! This module computes statistics over streams in a single pass with
//! constant memory. It also combines results computed over disjoint
//! partitions into the result of one pass over all of them.
//!
//! # Example
//!
//! ```
//! use opstats::statistics::{aggregate_moments, MomentAccumulator, StatsConfig};
//!
//! // Each worker owns an accumulator over its own partition
//! let partitions = [vec![1.0, 2.0, 3.0], vec![4.0, 5.0], vec![6.0, 7.0, 8.0, 9.0, 10.0]];
//! let snapshots: Vec<_> = partitions
//!     .iter()
//!     .map(|part| {
//!         let mut acc = MomentAccumulator::new();
//!         acc.add_all(part.iter().copied()).unwrap();
//!         acc.snapshot()
//!     })
//!     .collect();
//!
//! let combined = aggregate_moments(&snapshots).unwrap();
//! let stats = combined.stats(&StatsConfig::default());
//!
//! assert_eq!(stats.count, 10);
//! assert!((stats.mean - 5.5).abs() < 1e-12);
//! assert!((stats.kurtosis + 1.2242).abs() < 1e-4);
//! ```

mod config;
mod covariance;
mod moments;

pub use config::{StatsConfig, VarianceKind};
pub use covariance::{CovarianceAccumulator, CovarianceSnapshot, CovarianceStats};
pub use moments::{MomentAccumulator, MomentSnapshot, MomentStats};

use crate::aggregate::aggregate;
use crate::traits::StatsError;

/// Combine moment snapshots from disjoint partitions
///
/// Returns [`StatsError::EmptyAggregation`] for an empty slice. A single
/// snapshot is returned unchanged, and empty snapshots are skipped as identities.
pub fn aggregate_moments(snapshots: &[MomentSnapshot]) -> Result<MomentSnapshot, StatsError> {
    aggregate(snapshots)
}

/// Combine covariance snapshots from disjoint partitions
///
/// Same contract as [`aggregate_moments`].
pub fn aggregate_covariance(
    snapshots: &[CovarianceSnapshot],
) -> Result<CovarianceSnapshot, StatsError> {
    aggregate(snapshots)
}
