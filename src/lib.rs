//! # Opstats
//!
//! Online statistics for streaming and partitioned data.
//!
//! Opstats computes moments and covariance in a single pass with constant
//! memory, and combines partial results from independent partitions into
//! exactly what one pass over all the data would produce.
//!
//! ## Features
//!
//! - **Moments**: count, mean, variance, skewness and excess kurtosis
//! - **Covariance**: covariance and Pearson correlation of paired streams
//! - **Extended**: moments plus distinct count (HyperLogLog) and quantiles (t-digest)
//! - **Mergeability**: every partial result combines with others of its kind
//!
//! ## Quick Start
//!
//! ```rust
//! use opstats::prelude::*;
//!
//! let mut acc = MomentAccumulator::new();
//! for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
//!     acc.add(value).unwrap();
//! }
//!
//! let stats = acc.snapshot().stats(&StatsConfig::population());
//! assert!((stats.mean - 5.0).abs() < 1e-12);
//! assert!((stats.standard_deviation - 2.0).abs() < 1e-12);
//! ```
//!
//! ## Distributed Computing
//!
//! Snapshots are plain values. Each worker owns an accumulator and ships its
//! snapshot to whoever combines them:
//!
//! ```rust
//! use opstats::statistics::{aggregate_covariance, CovarianceAccumulator};
//!
//! let mut worker1 = CovarianceAccumulator::new();
//! let mut worker2 = CovarianceAccumulator::new();
//!
//! worker1.add_all([(1.0, 2.0), (2.0, 4.0)]).unwrap();
//! worker2.add_all([(3.0, 5.0), (4.0, 4.0), (5.0, 5.0)]).unwrap();
//!
//! let merged = aggregate_covariance(&[worker1.snapshot(), worker2.snapshot()]).unwrap();
//! assert!((merged.covariance() - 1.5).abs() < 1e-12);
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support. Without it math goes through `libm`.
//! - `extended` (default): [`ExtendedAccumulator`](extended::ExtendedAccumulator)
//! - `cardinality`: HyperLogLog distinct counting
//! - `quantiles`: t-digest quantiles
//! - `serde`: Serialization of snapshots, sketches and results
//! - `full`: Everything above

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Core traits always available
pub mod traits;

mod math;

pub mod aggregate;
pub mod statistics;

#[cfg(feature = "cardinality")]
#[cfg_attr(docsrs, doc(cfg(feature = "cardinality")))]
pub mod cardinality;

#[cfg(feature = "quantiles")]
#[cfg_attr(docsrs, doc(cfg(feature = "quantiles")))]
pub mod quantiles;

#[cfg(feature = "extended")]
#[cfg_attr(docsrs, doc(cfg(feature = "extended")))]
pub mod extended;

pub mod prelude {
    pub use crate::aggregate::{aggregate, aggregate_tree};
    pub use crate::statistics::{
        aggregate_covariance, aggregate_moments, CovarianceAccumulator, CovarianceSnapshot,
        MomentAccumulator, MomentSnapshot, StatsConfig, VarianceKind,
    };
    pub use crate::traits::*;

    #[cfg(feature = "cardinality")]
    pub use crate::cardinality::HyperLogLog;

    #[cfg(feature = "quantiles")]
    pub use crate::quantiles::TDigest;

    #[cfg(feature = "extended")]
    pub use crate::extended::{aggregate_extended, ExtendedAccumulator, ExtendedIntermediate};
}

pub use traits::{MergeError, StatsError};

pub use statistics::{CovarianceAccumulator, MomentAccumulator};

#[cfg(feature = "cardinality")]
pub use cardinality::HyperLogLog;

#[cfg(feature = "quantiles")]
pub use quantiles::TDigest;

#[cfg(feature = "extended")]
pub use extended::ExtendedAccumulator;
