//! Core traits and error types
//!
//! Snapshots that can be combined implement [`Aggregate`]. Mergeable
//! probabilistic summaries implement [`Sketch`], and the extended calculator
//! talks to them only through the [`Estimator`] capability traits.

use core::fmt::Debug;

#[cfg(feature = "std")]
use std::string::String;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::string::String;

/// Error during sketch merge operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Sketches have incompatible configurations
    IncompatibleConfig {
        expected: String,
        found: String,
    },
}

impl core::fmt::Display for MergeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MergeError::IncompatibleConfig { expected, found } => {
                write!(f, "incompatible config: expected {}, found {}", expected, found)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MergeError {}

/// Errors surfaced by accumulators and aggregation
///
/// Low sample counts are not an error: derived statistics that need more
/// observations than are available evaluate to `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsError {
    /// A NaN or infinite observation was passed to an accumulator
    InvalidInput { value: f64 },
    /// Aggregation was asked to combine zero snapshots
    EmptyAggregation,
    /// A requested percentile was outside `0..=100`
    InvalidPercentile(u8),
    /// Underlying sketches could not be merged
    Merge(MergeError),
}

impl core::fmt::Display for StatsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StatsError::InvalidInput { value } => {
                write!(f, "invalid input: observations must be finite, got {}", value)
            }
            StatsError::EmptyAggregation => write!(f, "cannot aggregate an empty collection"),
            StatsError::InvalidPercentile(p) => {
                write!(f, "invalid percentile: expected 0..=100, got {}", p)
            }
            StatsError::Merge(err) => write!(f, "merge failed: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StatsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatsError::Merge(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MergeError> for StatsError {
    fn from(err: MergeError) -> Self {
        StatsError::Merge(err)
    }
}

/// Check that an observation can be folded into an accumulator
#[inline]
pub(crate) fn check_finite(value: f64) -> Result<f64, StatsError> {
    if value.is_finite() {
        Ok(value)
    } else {
        log::debug!("rejecting non-finite observation {}", value);
        Err(StatsError::InvalidInput { value })
    }
}

/// Error bounds for a sketch estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorBounds {
    /// Lower bound of the estimate
    pub lower: f64,
    /// Point estimate
    pub estimate: f64,
    /// Upper bound of the estimate
    pub upper: f64,
    /// Confidence level (e.g., 0.95 for 95%)
    pub confidence: f64,
}

impl ErrorBounds {
    /// Create new error bounds
    pub fn new(lower: f64, estimate: f64, upper: f64, confidence: f64) -> Self {
        Self {
            lower,
            estimate,
            upper,
            confidence,
        }
    }

    /// Check if a value falls within bounds
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// A value that can be combined with another of its kind
///
/// `combine` must be commutative and associative (up to floating-point
/// rounding), and an empty value must act as the identity. The result of a
/// combine is itself a valid input to further combines.
pub trait Aggregate: Sized {
    /// Combine two partial results into one
    fn combine(&self, other: &Self) -> Result<Self, MergeError>;
}

/// Core trait for mergeable streaming sketches
pub trait Sketch: Clone + Debug {
    /// The type of item this sketch processes
    type Item: ?Sized;

    /// Add an item to the sketch
    fn update(&mut self, item: &Self::Item);

    /// Merge another sketch into this one
    ///
    /// Returns an error if sketches are incompatible
    fn merge(&mut self, other: &Self) -> Result<(), MergeError>;

    /// Reset sketch to empty state
    fn clear(&mut self);

    /// Number of items processed
    fn count(&self) -> u64;

    /// Check if sketch is empty
    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Cardinality (distinct count) estimation sketches
pub trait CardinalitySketch: Sketch {
    /// Estimate number of distinct items seen
    fn estimate(&self) -> f64;

    /// Get error bounds at given confidence level (0.0 to 1.0)
    fn error_bounds(&self, confidence: f64) -> ErrorBounds;

    /// Relative standard error (RSE) of the estimate
    fn relative_error(&self) -> f64;
}

/// Quantile estimation sketches
pub trait QuantileSketch: Sketch {
    /// Get quantile value at given rank (0.0 to 1.0)
    ///
    /// rank=0.5 returns the median
    fn quantile(&self, rank: f64) -> Option<f64>;

    /// Get rank of a value (0.0 to 1.0)
    fn rank(&self, value: f64) -> f64;

    /// Get median (50th percentile)
    fn median(&self) -> Option<f64> {
        self.quantile(0.5)
    }
}

/// Capability interface for the estimators used by the extended calculator
///
/// The calculator forwards every observation through [`observe`](Self::observe),
/// captures [`mergeable_state`](Self::mergeable_state) for parallel work and
/// combines captured states with [`merge`](Self::merge). It never looks inside
/// a `Sketch`.
pub trait Estimator: Clone + Debug {
    /// Opaque mergeable state
    type Sketch: Clone + Debug;

    /// Feed one observation
    fn observe(&mut self, value: f64);

    /// Capture the current state in mergeable form
    fn mergeable_state(&self) -> Self::Sketch;

    /// Combine two captured states
    fn merge(left: &Self::Sketch, right: &Self::Sketch) -> Result<Self::Sketch, MergeError>;
}

/// Estimator that finalizes to a distinct-value count
pub trait CardinalityEstimator: Estimator {
    /// Point estimate of the number of distinct observations
    fn finalize(sketch: &Self::Sketch) -> u64;
}

/// Estimator that finalizes to values at given ranks
pub trait QuantileEstimator: Estimator {
    /// Value at `rank` in `[0, 1]`, or `None` when nothing was observed
    fn finalize(sketch: &Self::Sketch, rank: f64) -> Option<f64>;
}
