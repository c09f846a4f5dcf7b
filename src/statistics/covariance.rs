//! Running covariance and correlation of paired observations
//!
//! Tracks the co-moment `C = Σ(x - mean_x)(y - mean_y)` next to the full
//! moments of each side, so both marginals keep their own skewness and
//! kurtosis. Snapshots from disjoint partitions combine with the bivariate
//! form of Chan's correction term.

use crate::math;
use crate::statistics::config::StatsConfig;
use crate::statistics::moments::{MomentAccumulator, MomentSnapshot, MomentStats};
use crate::traits::{check_finite, Aggregate, MergeError, StatsError};

/// Reported statistics derived from a [`CovarianceSnapshot`]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CovarianceStats {
    /// Number of paired observations
    pub count: u64,
    /// Sample or population covariance, per [`StatsConfig`]
    pub covariance: f64,
    /// Pearson correlation coefficient
    pub correlation: f64,
    /// Statistics of the first series
    pub x: MomentStats,
    /// Statistics of the second series
    pub y: MomentStats,
}

/// Immutable state of a [`CovarianceAccumulator`]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "CovarianceRecord")
)]
pub struct CovarianceSnapshot {
    x: MomentSnapshot,
    y: MomentSnapshot,
    comoment: f64,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct CovarianceRecord {
    x: MomentSnapshot,
    y: MomentSnapshot,
    comoment: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<CovarianceRecord> for CovarianceSnapshot {
    type Error = StatsError;

    fn try_from(r: CovarianceRecord) -> Result<Self, StatsError> {
        CovarianceSnapshot::from_parts(r.x, r.y, r.comoment)
    }
}

impl CovarianceSnapshot {
    /// Snapshot of an accumulator that has seen nothing
    pub const fn empty() -> Self {
        Self {
            x: MomentSnapshot::empty(),
            y: MomentSnapshot::empty(),
            comoment: 0.0,
        }
    }

    /// Rebuild a snapshot from persisted marginals and co-moment
    ///
    /// Both marginals must cover the same number of observations.
    pub fn from_parts(
        x: MomentSnapshot,
        y: MomentSnapshot,
        comoment: f64,
    ) -> Result<Self, StatsError> {
        check_finite(comoment)?;
        if x.count() != y.count() {
            return Err(StatsError::InvalidInput {
                value: y.count() as f64,
            });
        }
        if x.is_empty() && comoment != 0.0 {
            return Err(StatsError::InvalidInput { value: comoment });
        }
        Ok(Self { x, y, comoment })
    }

    /// Number of paired observations
    pub fn count(&self) -> u64 {
        self.x.count()
    }

    /// Check if no pairs were folded in
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Moments of the first series
    pub fn moments_x(&self) -> &MomentSnapshot {
        &self.x
    }

    /// Moments of the second series
    pub fn moments_y(&self) -> &MomentSnapshot {
        &self.y
    }

    /// Mean of the first series
    pub fn mean_x(&self) -> f64 {
        self.x.mean()
    }

    /// Mean of the second series
    pub fn mean_y(&self) -> f64 {
        self.y.mean()
    }

    /// Sum of squared deviations of the first series
    pub fn m2_x(&self) -> f64 {
        self.x.m2()
    }

    /// Sum of squared deviations of the second series
    pub fn m2_y(&self) -> f64 {
        self.y.m2()
    }

    /// Co-moment `Σ(x - mean_x)(y - mean_y)`
    pub fn comoment(&self) -> f64 {
        self.comoment
    }

    /// Sample covariance, 0 below two observations
    pub fn covariance(&self) -> f64 {
        StatsConfig::sample().normalize(self.comoment, self.count())
    }

    /// Population covariance, 0 when empty
    pub fn population_covariance(&self) -> f64 {
        StatsConfig::population().normalize(self.comoment, self.count())
    }

    /// Pearson correlation coefficient
    ///
    /// Zero below two observations or when either series is constant. The
    /// normalization cancels, so the value is the same for sample and
    /// population statistics. Rounding overshoot is clamped to `[-1, 1]`.
    pub fn correlation(&self) -> f64 {
        let (m2_x, m2_y) = (self.x.m2(), self.y.m2());
        if self.count() < 2 || m2_x <= 0.0 || m2_y <= 0.0 {
            return 0.0;
        }
        (self.comoment / math::sqrt(m2_x * m2_y)).clamp(-1.0, 1.0)
    }

    /// Report the derived statistics under `config`
    pub fn stats(&self, config: &StatsConfig) -> CovarianceStats {
        CovarianceStats {
            count: self.count(),
            covariance: config.normalize(self.comoment, self.count()),
            correlation: self.correlation(),
            x: self.x.stats(config),
            y: self.y.stats(config),
        }
    }

    /// Combine with a snapshot taken over a disjoint partition
    ///
    /// An empty snapshot on either side is the identity.
    pub fn combine(&self, other: &Self) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }

        let n_a = self.count() as f64;
        let n_b = other.count() as f64;
        let n = n_a + n_b;
        let delta_x = other.mean_x() - self.mean_x();
        let delta_y = other.mean_y() - self.mean_y();

        Self {
            x: self.x.combine(&other.x),
            y: self.y.combine(&other.y),
            comoment: self.comoment + other.comoment + delta_x * delta_y * n_a * n_b / n,
        }
    }
}

impl Aggregate for CovarianceSnapshot {
    fn combine(&self, other: &Self) -> Result<Self, MergeError> {
        Ok(CovarianceSnapshot::combine(self, other))
    }
}

/// Online calculator for covariance and correlation
///
/// # Example
///
/// ```
/// use opstats::statistics::CovarianceAccumulator;
///
/// let mut acc = CovarianceAccumulator::new();
/// for (x, y) in [(1.0, 2.0), (2.0, 4.0), (3.0, 5.0), (4.0, 4.0), (5.0, 5.0)] {
///     acc.add(x, y).unwrap();
/// }
///
/// let snapshot = acc.snapshot();
/// assert!((snapshot.covariance() - 1.5).abs() < 1e-12);
/// assert!((snapshot.correlation() - 6.0 / 60f64.sqrt()).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CovarianceAccumulator {
    x: MomentAccumulator,
    y: MomentAccumulator,
    comoment: f64,
}

impl CovarianceAccumulator {
    /// Create a new empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume accumulating on top of a previously taken snapshot
    pub fn from_snapshot(snapshot: CovarianceSnapshot) -> Self {
        Self {
            x: MomentAccumulator::from_snapshot(snapshot.x),
            y: MomentAccumulator::from_snapshot(snapshot.y),
            comoment: snapshot.comoment,
        }
    }

    /// Add a paired observation
    ///
    /// If either value is NaN or infinite the pair is rejected with
    /// [`StatsError::InvalidInput`] and nothing is updated.
    pub fn add(&mut self, x: f64, y: f64) -> Result<(), StatsError> {
        let x = check_finite(x)?;
        let y = check_finite(y)?;

        // co-moment pairs the old x mean with the new y mean
        let dx = x - self.x.snapshot().mean();
        self.x.push(x);
        self.y.push(y);
        self.comoment += dx * (y - self.y.snapshot().mean());
        Ok(())
    }

    /// Add every pair from an iterator, stopping at the first invalid one
    pub fn add_all<I>(&mut self, pairs: I) -> Result<(), StatsError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        pairs.into_iter().try_for_each(|(x, y)| self.add(x, y))
    }

    /// Fold a snapshot from another partition into this accumulator
    pub fn merge(&mut self, other: &CovarianceSnapshot) {
        *self = Self::from_snapshot(self.snapshot().combine(other));
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> CovarianceSnapshot {
        CovarianceSnapshot {
            x: self.x.snapshot(),
            y: self.y.snapshot(),
            comoment: self.comoment,
        }
    }

    /// Alias of [`snapshot`](Self::snapshot)
    pub fn get(&self) -> CovarianceSnapshot {
        self.snapshot()
    }

    /// Number of paired observations
    pub fn len(&self) -> u64 {
        self.x.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Reset to the empty state
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XS: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];
    const YS: [f64; 5] = [2.0, 4.0, 5.0, 4.0, 5.0];

    fn accumulate(xs: &[f64], ys: &[f64]) -> CovarianceSnapshot {
        let mut acc = CovarianceAccumulator::new();
        acc.add_all(xs.iter().copied().zip(ys.iter().copied()))
            .unwrap();
        acc.snapshot()
    }

    /// Textbook two-pass co-moment
    fn two_pass_comoment(xs: &[f64], ys: &[f64]) -> f64 {
        let n = xs.len() as f64;
        let mx = xs.iter().sum::<f64>() / n;
        let my = ys.iter().sum::<f64>() / n;
        xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_basic() {
        let s = accumulate(&XS, &YS);

        assert_eq!(s.count(), 5);
        assert!(close(s.mean_x(), 3.0));
        assert!(close(s.mean_y(), 4.0));
        assert!(close(s.m2_x(), 10.0));
        assert!(close(s.m2_y(), 6.0));
        assert!(close(s.comoment(), 6.0));
        assert!(close(s.covariance(), 1.5));
        assert!(close(s.population_covariance(), 1.2));
        assert!(close(s.correlation(), 6.0 / 60f64.sqrt()));
        assert!((s.correlation() - 0.7746).abs() < 1e-4);
    }

    #[test]
    fn test_matches_two_pass() {
        let xs = [0.3, -1.7, 8.25, 4.0, 4.0, 19.5, -6.125, 2.0];
        let ys = [10.0, 9.5, -3.0, 0.0, 7.75, -12.0, 3.5, 1.0];
        let s = accumulate(&xs, &ys);

        assert!(close(s.comoment(), two_pass_comoment(&xs, &ys)));
        assert!(close(s.m2_x(), two_pass_comoment(&xs, &xs)));
        assert!(close(s.m2_y(), two_pass_comoment(&ys, &ys)));
    }

    #[test]
    fn test_split_and_combine() {
        let whole = accumulate(&XS, &YS);
        let merged = accumulate(&XS[..2], &YS[..2]).combine(&accumulate(&XS[2..], &YS[2..]));

        assert_eq!(merged.count(), whole.count());
        assert!(close(merged.mean_x(), whole.mean_x()));
        assert!(close(merged.mean_y(), whole.mean_y()));
        assert!(close(merged.m2_x(), whole.m2_x()));
        assert!(close(merged.m2_y(), whole.m2_y()));
        assert!(close(merged.covariance(), whole.covariance()));
        assert!(close(merged.correlation(), whole.correlation()));
    }

    #[test]
    fn test_combine_identity() {
        let s = accumulate(&XS, &YS);
        let empty = CovarianceSnapshot::empty();

        assert_eq!(empty.combine(&s), s);
        assert_eq!(s.combine(&empty), s);
    }

    #[test]
    fn test_marginals_match_moment_accumulator() {
        let s = accumulate(&XS, &YS);

        let mut mx = MomentAccumulator::new();
        mx.add_all(XS).unwrap();
        let mut my = MomentAccumulator::new();
        my.add_all(YS).unwrap();

        assert_eq!(*s.moments_x(), mx.snapshot());
        assert_eq!(*s.moments_y(), my.snapshot());
    }

    #[test]
    fn test_perfect_correlation() {
        let xs: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let up: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();
        let down: Vec<f64> = xs.iter().map(|x| -0.5 * x).collect();

        assert!(close(accumulate(&xs, &up).correlation(), 1.0));
        assert!(close(accumulate(&xs, &down).correlation(), -1.0));
    }

    #[test]
    fn test_low_count_and_constant() {
        let empty = CovarianceAccumulator::new().snapshot();
        assert_eq!(empty.covariance(), 0.0);
        assert_eq!(empty.population_covariance(), 0.0);
        assert_eq!(empty.correlation(), 0.0);

        let single = accumulate(&[1.0], &[2.0]);
        assert_eq!(single.covariance(), 0.0);
        assert_eq!(single.correlation(), 0.0);

        let flat = accumulate(&[1.0, 2.0, 3.0], &[7.0, 7.0, 7.0]);
        assert_eq!(flat.covariance(), 0.0);
        assert_eq!(flat.correlation(), 0.0);
    }

    #[test]
    fn test_rejects_non_finite_pair() {
        let mut acc = CovarianceAccumulator::new();
        acc.add(1.0, 2.0).unwrap();
        acc.add(2.0, 3.0).unwrap();
        let before = acc.snapshot();

        assert!(acc.add(3.0, f64::NAN).is_err());
        assert!(acc.add(f64::INFINITY, 3.0).is_err());
        assert_eq!(acc.snapshot(), before);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn test_stats_config() {
        let s = accumulate(&XS, &YS);

        let sample = s.stats(&StatsConfig::sample());
        assert_eq!(sample.count, 5);
        assert!(close(sample.covariance, 1.5));
        assert!(close(sample.x.variance, 2.5));
        assert!(close(sample.y.variance, 1.5));

        let population = s.stats(&StatsConfig::population());
        assert!(close(population.covariance, 1.2));
        assert!(close(population.x.variance, 2.0));
        assert_eq!(population.correlation, sample.correlation);
    }

    #[test]
    fn test_merge_into_accumulator() {
        let mut acc = CovarianceAccumulator::new();
        acc.add_all(XS[..3].iter().copied().zip(YS[..3].iter().copied()))
            .unwrap();
        acc.merge(&accumulate(&XS[3..], &YS[3..]));

        assert_eq!(acc.len(), 5);
        assert!(close(acc.snapshot().covariance(), 1.5));

        acc.clear();
        assert!(acc.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_validates() {
        let s = accumulate(&XS, &YS);
        let json = serde_json::to_string(&s).unwrap();
        let restored: CovarianceSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.count(), 5);

        let mismatched = r#"{
            "x": {"count":0,"mean":0.0,"m2":0.0,"m3":0.0,"m4":0.0},
            "y": {"count":5,"mean":4.0,"m2":6.0,"m3":0.0,"m4":10.0},
            "comoment": 7.0
        }"#;
        assert!(serde_json::from_str::<CovarianceSnapshot>(mismatched).is_err());

        let bad_marginal = r#"{
            "x": {"count":2,"mean":1.0,"m2":-1.0,"m3":0.0,"m4":1.0},
            "y": {"count":2,"mean":1.0,"m2":1.0,"m3":0.0,"m4":1.0},
            "comoment": 0.5
        }"#;
        assert!(serde_json::from_str::<CovarianceSnapshot>(bad_marginal).is_err());
    }

    #[test]
    fn test_from_parts() {
        let s = accumulate(&XS, &YS);
        let rebuilt = CovarianceSnapshot::from_parts(*s.moments_x(), *s.moments_y(), s.comoment());
        assert_eq!(rebuilt, Ok(s));

        let short = accumulate(&XS[..2], &YS[..2]);
        assert!(CovarianceSnapshot::from_parts(*s.moments_x(), *short.moments_y(), 0.0).is_err());
        assert!(CovarianceSnapshot::from_parts(
            MomentSnapshot::empty(),
            MomentSnapshot::empty(),
            1.0
        )
        .is_err());
    }
}
