use crate::cardinality::HyperLogLog;
use crate::extended::ExtendedConfig;
use crate::quantiles::TDigest;
use crate::statistics::{MomentAccumulator, MomentSnapshot, StatsConfig};
use crate::traits::{Aggregate, CardinalityEstimator, MergeError, QuantileEstimator, StatsError};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Final statistics of an extended calculation
///
/// Not mergeable. Combine [`ExtendedIntermediate`]s first, then finalize.
/// When nothing was observed every field is zero.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtendedResult {
    /// Number of observations
    pub count: u64,
    /// Arithmetic mean
    pub mean: f64,
    /// Sum of all observations
    pub total: f64,
    /// Sample or population variance, per [`StatsConfig`]
    pub variance: f64,
    /// Square root of `variance`
    pub standard_deviation: f64,
    /// Skewness, bias-adjusted if requested
    pub skewness: f64,
    /// Excess kurtosis, bias-adjusted if requested
    pub kurtosis: f64,
    /// Estimated number of distinct observations
    pub cardinality: u64,
    /// Value at rank 0.5
    pub median: f64,
    /// `q(0.75) - q(0.25)`
    pub interquartile_range: f64,
    /// Requested percentiles in request order, as `(percentile, value)`
    pub percentiles: Vec<(u8, f64)>,
}

/// Mergeable state of an [`ExtendedAccumulator`]
///
/// Holds a moment snapshot and the captured state of each estimator. It owns
/// its data and can be moved to another thread for combining.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound(
        serialize = "C::Sketch: serde::Serialize, Q::Sketch: serde::Serialize",
        deserialize = "C::Sketch: serde::Deserialize<'de>, Q::Sketch: serde::Deserialize<'de>"
    ))
)]
pub struct ExtendedIntermediate<C = HyperLogLog, Q = TDigest>
where
    C: CardinalityEstimator,
    Q: QuantileEstimator,
{
    moments: MomentSnapshot,
    cardinality: C::Sketch,
    quantiles: Q::Sketch,
}

impl<C, Q> ExtendedIntermediate<C, Q>
where
    C: CardinalityEstimator,
    Q: QuantileEstimator,
{
    /// Moments of the covered observations
    pub fn moments(&self) -> &MomentSnapshot {
        &self.moments
    }

    /// Captured state of the cardinality estimator
    pub fn cardinality_sketch(&self) -> &C::Sketch {
        &self.cardinality
    }

    /// Captured state of the quantile estimator
    pub fn quantile_sketch(&self) -> &Q::Sketch {
        &self.quantiles
    }

    /// Number of observations covered
    pub fn count(&self) -> u64 {
        self.moments.count()
    }

    /// Finalize with sample variance and no extra percentiles
    pub fn calculate(self) -> ExtendedResult {
        self.finalize(&StatsConfig::default(), &[])
    }

    /// Finalize with the given variance options, also reporting each
    /// requested percentile
    ///
    /// Fails with [`StatsError::InvalidPercentile`] if any percentile is
    /// above 100.
    pub fn calculate_with(
        self,
        config: &StatsConfig,
        percentiles: &[u8],
    ) -> Result<ExtendedResult, StatsError> {
        if let Some(&p) = percentiles.iter().find(|&&p| p > 100) {
            return Err(StatsError::InvalidPercentile(p));
        }
        Ok(self.finalize(config, percentiles))
    }

    fn finalize(self, config: &StatsConfig, percentiles: &[u8]) -> ExtendedResult {
        let stats = self.moments.stats(config);
        let at = |rank: f64| Q::finalize(&self.quantiles, rank).unwrap_or(0.0);

        ExtendedResult {
            count: stats.count,
            mean: stats.mean,
            total: stats.total,
            variance: stats.variance,
            standard_deviation: stats.standard_deviation,
            skewness: stats.skewness,
            kurtosis: stats.kurtosis,
            cardinality: C::finalize(&self.cardinality),
            median: at(0.5),
            interquartile_range: at(0.75) - at(0.25),
            percentiles: percentiles
                .iter()
                .map(|&p| (p, at(f64::from(p) / 100.0)))
                .collect(),
        }
    }
}

impl<C, Q> Aggregate for ExtendedIntermediate<C, Q>
where
    C: CardinalityEstimator,
    Q: QuantileEstimator,
{
    /// An intermediate with no observations is the identity, whatever its
    /// estimator configuration
    fn combine(&self, other: &Self) -> Result<Self, MergeError> {
        if other.moments.is_empty() {
            log::trace!("combine: right intermediate empty, keeping left");
            return Ok(self.clone());
        }
        if self.moments.is_empty() {
            log::trace!("combine: left intermediate empty, taking right");
            return Ok(other.clone());
        }
        Ok(Self {
            moments: self.moments.combine(&other.moments),
            cardinality: C::merge(&self.cardinality, &other.cardinality)?,
            quantiles: Q::merge(&self.quantiles, &other.quantiles)?,
        })
    }
}

/// Moments, distinct count and quantiles over one stream
///
/// Non-finite observations are rejected before any estimator sees them, so
/// the moments and both sketches always cover the same values.
///
/// # Example
///
/// ```
/// use opstats::extended::ExtendedAccumulator;
/// use opstats::statistics::StatsConfig;
///
/// let mut acc = ExtendedAccumulator::new();
/// acc.add_all([3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0]).unwrap();
///
/// let result = acc
///     .get_parallel()
///     .calculate_with(&StatsConfig::population(), &[90])
///     .unwrap();
/// assert_eq!(result.count, 8);
/// assert_eq!(result.cardinality, 7);
/// assert_eq!(result.percentiles.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct ExtendedAccumulator<C = HyperLogLog, Q = TDigest>
where
    C: CardinalityEstimator,
    Q: QuantileEstimator,
{
    moments: MomentAccumulator,
    cardinality: C,
    quantiles: Q,
}

impl ExtendedAccumulator<HyperLogLog, TDigest> {
    /// Accumulator with the default estimators
    pub fn new() -> Self {
        Self::with_config(ExtendedConfig::default())
    }

    /// Accumulator with default estimators built from `config`
    ///
    /// # Panics
    ///
    /// Panics if `config.compression` is not finite and positive.
    pub fn with_config(config: ExtendedConfig) -> Self {
        let (cardinality, quantiles) = config.estimators();
        Self::with_estimators(cardinality, quantiles)
    }
}

impl Default for ExtendedAccumulator<HyperLogLog, TDigest> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, Q> ExtendedAccumulator<C, Q>
where
    C: CardinalityEstimator,
    Q: QuantileEstimator,
{
    /// Accumulator over caller-supplied estimators
    pub fn with_estimators(cardinality: C, quantiles: Q) -> Self {
        Self {
            moments: MomentAccumulator::new(),
            cardinality,
            quantiles,
        }
    }

    /// Add one observation
    ///
    /// A non-finite value is rejected with [`StatsError::InvalidInput`] and
    /// nothing is updated.
    pub fn add(&mut self, value: f64) -> Result<(), StatsError> {
        self.moments.add(value)?;
        self.cardinality.observe(value);
        self.quantiles.observe(value);
        Ok(())
    }

    /// Add every value, stopping at the first rejected one
    pub fn add_all<I>(&mut self, values: I) -> Result<(), StatsError>
    where
        I: IntoIterator<Item = f64>,
    {
        values.into_iter().try_for_each(|v| self.add(v))
    }

    /// Moment snapshot of everything added so far
    pub fn get(&self) -> MomentSnapshot {
        self.moments.snapshot()
    }

    /// Capture the mergeable state for combining with other partitions
    pub fn get_parallel(&self) -> ExtendedIntermediate<C, Q> {
        ExtendedIntermediate {
            moments: self.moments.snapshot(),
            cardinality: self.cardinality.mergeable_state(),
            quantiles: self.quantiles.mergeable_state(),
        }
    }

    /// Finalize the current state without consuming the accumulator
    pub fn calculate(&self) -> ExtendedResult {
        self.get_parallel().calculate()
    }

    /// Number of accepted observations
    pub fn len(&self) -> u64 {
        self.moments.len()
    }

    /// Check if nothing was accepted yet
    pub fn is_empty(&self) -> bool {
        self.moments.is_empty()
    }
}
