//! Running central moments (mean, variance, skewness, kurtosis)
//!
//! Computes streaming moments up to fourth order with the single-pass update
//! of Welford generalized by Terriberry, and combines partial results from
//! disjoint partitions with the pairwise formulas of Chan et al.

use crate::math;
use crate::statistics::config::StatsConfig;
use crate::traits::{check_finite, Aggregate, MergeError, StatsError};

/// Reported statistics derived from a [`MomentSnapshot`]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MomentStats {
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
}

/// Immutable state of a [`MomentAccumulator`]
///
/// Holds the observation count, the mean and the unnormalized central-moment
/// sums `m2 = Σ(x - mean)²`, `m3 = Σ(x - mean)³` and `m4 = Σ(x - mean)⁴`.
/// Everything else is derived on demand. Only the raw sums are stored, so two
/// snapshots combine exactly with [`combine`](Self::combine).
///
/// Derived statistics follow a low-count policy instead of failing: values
/// that need more observations than are available are `0.0`, never NaN.
///
/// # Example
///
/// ```
/// use opstats::statistics::{aggregate_moments, MomentAccumulator};
///
/// let mut left = MomentAccumulator::new();
/// let mut right = MomentAccumulator::new();
/// for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
///     left.add(v).unwrap();
/// }
/// for v in [6.0, 7.0, 8.0, 9.0, 10.0] {
///     right.add(v).unwrap();
/// }
///
/// let merged = aggregate_moments(&[left.snapshot(), right.snapshot()]).unwrap();
/// assert_eq!(merged.count(), 10);
/// assert!((merged.mean() - 5.5).abs() < 1e-12);
/// assert!((merged.variance() - 82.5 / 9.0).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "MomentRecord")
)]
pub struct MomentSnapshot {
    count: u64,
    mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
}

/// Persisted form of a [`MomentSnapshot`], checked by `from_parts` on load
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct MomentRecord {
    count: u64,
    mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<MomentRecord> for MomentSnapshot {
    type Error = StatsError;

    fn try_from(r: MomentRecord) -> Result<Self, StatsError> {
        MomentSnapshot::from_parts(r.count, r.mean, r.m2, r.m3, r.m4)
    }
}

impl MomentSnapshot {
    /// Snapshot of an accumulator that has seen nothing
    pub const fn empty() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            m3: 0.0,
            m4: 0.0,
        }
    }

    /// Rebuild a snapshot from persisted fields
    ///
    /// Every field must be finite, `m2` and `m4` must be non-negative, and an
    /// empty snapshot must have all sums at zero.
    pub fn from_parts(count: u64, mean: f64, m2: f64, m3: f64, m4: f64) -> Result<Self, StatsError> {
        for value in [mean, m2, m3, m4] {
            check_finite(value)?;
        }
        for value in [m2, m4] {
            if value < 0.0 {
                return Err(StatsError::InvalidInput { value });
            }
        }
        if count == 0 {
            if let Some(value) = [mean, m2, m3, m4].into_iter().find(|v| *v != 0.0) {
                return Err(StatsError::InvalidInput { value });
            }
        }

        Ok(Self {
            count,
            mean,
            m2,
            m3,
            m4,
        })
    }

    /// Number of observations
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Check if no observations were folded in
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Running mean, 0 when empty
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sum of squared deviations from the mean
    pub fn m2(&self) -> f64 {
        self.m2
    }

    /// Sum of cubed deviations from the mean
    pub fn m3(&self) -> f64 {
        self.m3
    }

    /// Sum of fourth-power deviations from the mean
    pub fn m4(&self) -> f64 {
        self.m4
    }

    /// Sum of all observations
    pub fn total(&self) -> f64 {
        self.mean * self.count as f64
    }

    /// Sample variance (Bessel's correction), 0 below two observations
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Population variance, 0 when empty
    pub fn population_variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Sample standard deviation
    pub fn standard_deviation(&self) -> f64 {
        math::sqrt(self.variance())
    }

    /// Fisher-Pearson skewness `g1 = sqrt(n) * m3 / m2^(3/2)`
    ///
    /// Zero below two observations or when every observation is equal.
    pub fn skewness(&self) -> f64 {
        if self.count < 2 || self.m2 <= 0.0 {
            return 0.0;
        }
        let n = self.count as f64;
        math::sqrt(n) * self.m3 / (self.m2 * math::sqrt(self.m2))
    }

    /// Excess kurtosis `g2 = n * m4 / m2² - 3`
    ///
    /// Zero below two observations or when every observation is equal.
    pub fn kurtosis(&self) -> f64 {
        if self.count < 2 || self.m2 <= 0.0 {
            return 0.0;
        }
        let n = self.count as f64;
        n * self.m4 / (self.m2 * self.m2) - 3.0
    }

    /// Adjusted Fisher-Pearson skewness `G1`, zero below three observations
    pub fn adjusted_skewness(&self) -> f64 {
        if self.count < 3 {
            return 0.0;
        }
        let n = self.count as f64;
        self.skewness() * math::sqrt(n * (n - 1.0)) / (n - 2.0)
    }

    /// Adjusted excess kurtosis `G2`, zero below four observations
    pub fn adjusted_kurtosis(&self) -> f64 {
        if self.count < 4 || self.m2 <= 0.0 {
            return 0.0;
        }
        let n = self.count as f64;
        ((n + 1.0) * self.kurtosis() + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
    }

    /// Report the derived statistics under `config`
    pub fn stats(&self, config: &StatsConfig) -> MomentStats {
        let variance = config.normalize(self.m2, self.count);
        let (skewness, kurtosis) = if config.bias_adjust {
            (self.adjusted_skewness(), self.adjusted_kurtosis())
        } else {
            (self.skewness(), self.kurtosis())
        };

        MomentStats {
            count: self.count,
            mean: self.mean,
            total: self.total(),
            variance,
            standard_deviation: math::sqrt(variance),
            skewness,
            kurtosis,
        }
    }

    /// Combine with a snapshot taken over a disjoint partition
    ///
    /// The result equals (up to rounding) a single pass over both partitions.
    /// An empty snapshot on either side is the identity.
    pub fn combine(&self, other: &Self) -> Self {
        if other.count == 0 {
            log::trace!("combine: right side empty, keeping left");
            return *self;
        }
        if self.count == 0 {
            log::trace!("combine: left side empty, taking right");
            return *other;
        }

        let count = self.count + other.count;
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = count as f64;

        let delta = other.mean - self.mean;
        let delta2 = delta * delta;
        let delta3 = delta2 * delta;
        let delta4 = delta2 * delta2;

        let mean = self.mean + delta * n_b / n;
        let m2 = self.m2 + other.m2 + delta2 * n_a * n_b / n;
        let m3 = self.m3
            + other.m3
            + delta3 * n_a * n_b * (n_a - n_b) / (n * n)
            + 3.0 * delta * (n_a * other.m2 - n_b * self.m2) / n;
        let m4 = self.m4
            + other.m4
            + delta4 * n_a * n_b * (n_a * n_a - n_a * n_b + n_b * n_b) / (n * n * n)
            + 6.0 * delta2 * (n_a * n_a * other.m2 + n_b * n_b * self.m2) / (n * n)
            + 4.0 * delta * (n_a * other.m3 - n_b * self.m3) / n;

        Self {
            count,
            mean,
            m2,
            m3,
            m4,
        }
    }
}

impl Aggregate for MomentSnapshot {
    fn combine(&self, other: &Self) -> Result<Self, MergeError> {
        Ok(MomentSnapshot::combine(self, other))
    }
}

/// Online calculator for mean, variance, skewness and kurtosis
///
/// Each call to [`add`](Self::add) folds one observation into the running
/// sums in O(1) time and memory, without the cancellation problems of
/// sum-of-powers formulas.
///
/// An accumulator is meant for a single writer. For parallel work give each
/// worker its own accumulator over a disjoint partition and combine their
/// snapshots with [`aggregate_moments`](crate::statistics::aggregate_moments).
///
/// # Example
///
/// ```
/// use opstats::statistics::MomentAccumulator;
///
/// let mut acc = MomentAccumulator::new();
/// for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
///     acc.add(v).unwrap();
/// }
///
/// let snapshot = acc.snapshot();
/// assert!((snapshot.mean() - 5.0).abs() < 1e-12);
/// assert!((snapshot.population_variance() - 4.0).abs() < 1e-12);
///
/// // Non-finite input is rejected and leaves the state untouched
/// assert!(acc.add(f64::NAN).is_err());
/// assert_eq!(acc.snapshot(), snapshot);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MomentAccumulator {
    state: MomentSnapshot,
}

impl MomentAccumulator {
    /// Create a new empty accumulator
    pub fn new() -> Self {
        Self {
            state: MomentSnapshot::empty(),
        }
    }

    /// Resume accumulating on top of a previously taken snapshot
    pub fn from_snapshot(snapshot: MomentSnapshot) -> Self {
        Self { state: snapshot }
    }

    /// Add an observation
    ///
    /// Returns [`StatsError::InvalidInput`] for NaN or infinite values.
    pub fn add(&mut self, value: f64) -> Result<(), StatsError> {
        let value = check_finite(value)?;
        self.push(value);
        Ok(())
    }

    /// Add every observation from an iterator
    ///
    /// Stops at the first non-finite value. Values before it stay folded in.
    pub fn add_all<I>(&mut self, values: I) -> Result<(), StatsError>
    where
        I: IntoIterator<Item = f64>,
    {
        values.into_iter().try_for_each(|v| self.add(v))
    }

    /// Terriberry's update. The order of the sums matters: each higher moment
    /// reads the lower moments from before this observation.
    pub(super) fn push(&mut self, value: f64) {
        let s = &mut self.state;

        // first observation: every central sum is exactly zero
        if s.count == 0 {
            s.mean = value;
            s.count = 1;
            return;
        }

        let n1 = s.count as f64;
        let n = n1 + 1.0;
        let delta = value - s.mean;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term1 = delta * (delta_n * n1);

        s.m4 += term1 * delta_n2 * (n * n - 3.0 * n + 3.0) + 6.0 * delta_n2 * s.m2
            - 4.0 * delta_n * s.m3;
        s.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * s.m2;
        s.m2 += term1;
        s.mean += delta_n;
        s.count += 1;
    }

    /// Fold a snapshot from another partition into this accumulator
    pub fn merge(&mut self, other: &MomentSnapshot) {
        self.state = self.state.combine(other);
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> MomentSnapshot {
        self.state
    }

    /// Alias of [`snapshot`](Self::snapshot)
    pub fn get(&self) -> MomentSnapshot {
        self.snapshot()
    }

    /// Number of observations
    pub fn len(&self) -> u64 {
        self.state.count
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.state.count == 0
    }

    /// Reset to the empty state
    pub fn clear(&mut self) {
        self.state = MomentSnapshot::empty();
    }
}
