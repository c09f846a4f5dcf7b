//! Cardinality (distinct count) estimation
//!
//! [`HyperLogLog`] is the default cardinality estimator of the extended
//! calculator. Any type implementing
//! [`CardinalityEstimator`](crate::traits::CardinalityEstimator) can stand in
//! for it.
//!
//! # Example
//!
//! ```
//! use opstats::cardinality::HyperLogLog;
//! use opstats::traits::CardinalitySketch;
//!
//! let mut hll = HyperLogLog::with_error(0.01); // ~1% error
//!
//! for i in 0..10000 {
//!     hll.insert_f64(i as f64);
//! }
//!
//! let estimate = hll.estimate();
//! assert!((estimate - 10000.0).abs() < 500.0);
//! ```

mod hyperloglog;

pub use hyperloglog::{HyperLogLog, MAX_PRECISION, MIN_PRECISION};

use crate::math;

/// Relative standard error targeted when no other is configured
pub const DEFAULT_ERROR_RATE: f64 = 0.01;

/// Compute the required precision for a target error rate
///
/// HLL error is approximately 1.04 / sqrt(2^p)
pub fn precision_for_error(target_error: f64) -> u8 {
    // m = (1.04 / error)^2, p = log2(m)
    let ratio = 1.04 / target_error;
    let p = math::ceil(math::log2(ratio * ratio));
    if p.is_nan() {
        return MAX_PRECISION;
    }
    p.clamp(MIN_PRECISION as f64, MAX_PRECISION as f64) as u8
}

/// Compute the expected error for a given precision
pub fn error_for_precision(precision: u8) -> f64 {
    let m = (1usize << precision) as f64;
    1.04 / math::sqrt(m)
}
