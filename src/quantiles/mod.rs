//! Quantile estimation
//!
//! [`TDigest`] is the default quantile estimator of the extended calculator.
//! Any type implementing
//! [`QuantileEstimator`](crate::traits::QuantileEstimator) can stand in for it.
//!
//! # Example
//!
//! ```
//! use opstats::quantiles::TDigest;
//! use opstats::traits::QuantileSketch;
//!
//! let mut digest = TDigest::new(100.0);
//!
//! for value in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0] {
//!     digest.add(value);
//! }
//!
//! let median = digest.median().unwrap();
//! assert!((median - 5.5).abs() < 1.0);
//! ```

mod tdigest;

pub use tdigest::{Centroid, TDigest};

/// Compression used when no other is configured
pub const DEFAULT_COMPRESSION: f64 = 100.0;
