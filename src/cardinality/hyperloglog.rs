//! HyperLogLog distinct-value estimator
//!
//! Registers keep the longest run of leading zeros seen per hash bucket, so
//! two sketches with the same precision merge exactly by taking the
//! register-wise maximum.

use crate::math;
use crate::traits::{
    CardinalityEstimator, CardinalitySketch, ErrorBounds, Estimator, MergeError, Sketch,
};
use xxhash_rust::xxh3::xxh3_64;

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{format, vec, vec::Vec};

/// Smallest supported precision
pub const MIN_PRECISION: u8 = 4;
/// Largest supported precision
pub const MAX_PRECISION: u8 = 18;

/// HyperLogLog cardinality estimator
///
/// Estimates the number of distinct observations in `2^precision` bytes. The
/// relative standard error is about `1.04 / sqrt(2^precision)`:
///
/// | Precision | Memory | Error |
/// |-----------|--------|-------|
/// | 10 | 1 KB | ~3.25% |
/// | 12 | 4 KB | ~1.63% |
/// | 14 | 16 KB | ~0.81% |
/// | 16 | 64 KB | ~0.41% |
///
/// Numeric observations are hashed by bit pattern after folding `-0.0` onto
/// `0.0`, so values that compare equal count once.
///
/// # Example
///
/// ```
/// use opstats::cardinality::HyperLogLog;
/// use opstats::traits::CardinalitySketch;
///
/// let mut hll = HyperLogLog::new(12);
/// for i in 0..1000 {
///     hll.insert_f64((i % 250) as f64);
/// }
///
/// let estimate = hll.estimate();
/// assert!(estimate > 240.0 && estimate < 260.0);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HyperLogLog {
    /// Precision parameter (4-18)
    precision: u8,
    /// One byte per register
    registers: Vec<u8>,
    /// Number of items inserted
    count: u64,
}

impl HyperLogLog {
    /// Create a new HyperLogLog with the given precision
    ///
    /// # Panics
    ///
    /// Panics if precision is not in range [4, 18]
    pub fn new(precision: u8) -> Self {
        assert!(
            (MIN_PRECISION..=MAX_PRECISION).contains(&precision),
            "precision must be between 4 and 18"
        );

        Self {
            precision,
            registers: vec![0u8; 1usize << precision],
            count: 0,
        }
    }

    /// Create a HyperLogLog targeting a relative standard error
    pub fn with_error(target_error: f64) -> Self {
        Self::new(super::precision_for_error(target_error))
    }

    /// Get the precision parameter
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Get the number of registers (m = 2^precision)
    pub fn num_registers(&self) -> usize {
        self.registers.len()
    }

    /// Insert a numeric observation
    ///
    /// NaN is ignored: its many bit patterns would each count as distinct.
    pub fn insert_f64(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        let canonical = if value == 0.0 { 0.0f64 } else { value };
        self.insert_bytes(&canonical.to_bits().to_le_bytes());
    }

    /// Insert raw bytes
    pub fn insert_bytes(&mut self, bytes: &[u8]) {
        self.insert_hash(xxh3_64(bytes));
    }

    /// Insert a pre-computed 64-bit hash
    pub fn insert_hash(&mut self, hash: u64) {
        self.count += 1;

        // top p bits pick the register
        let idx = (hash >> (64 - self.precision)) as usize;

        // sentinel bit caps rho at 64 - p + 1
        let w = hash << self.precision | (1u64 << (self.precision - 1));
        let rho = w.leading_zeros() as u8 + 1;

        if rho > self.registers[idx] {
            self.registers[idx] = rho;
        }
    }

    /// Harmonic-mean estimate before small-range correction
    fn raw_estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let sum: f64 = self
            .registers
            .iter()
            .map(|&r| math::exp2(-(r as f64)))
            .sum();
        self.alpha_m() * m * m / sum
    }

    fn alpha_m(&self) -> f64 {
        match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            m => 0.7213 / (1.0 + 1.079 / m as f64),
        }
    }

    /// Switch to linear counting while empty registers remain and the raw
    /// estimate is below `2.5 m`
    fn small_range_correction(&self, raw: f64) -> f64 {
        let m = self.registers.len() as f64;
        let threshold = 2.5 * m;
        if raw > threshold {
            return raw;
        }

        let zeros = self.registers.iter().filter(|&&r| r == 0).count();
        if zeros == 0 {
            return raw;
        }
        let linear = m * math::ln(m / zeros as f64);
        if linear <= threshold {
            linear
        } else {
            raw
        }
    }
}

impl Default for HyperLogLog {
    fn default() -> Self {
        Self::with_error(super::DEFAULT_ERROR_RATE)
    }
}

impl Sketch for HyperLogLog {
    type Item = [u8];

    fn update(&mut self, item: &[u8]) {
        self.insert_bytes(item);
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.precision != other.precision {
            return Err(MergeError::IncompatibleConfig {
                expected: format!("precision={}", self.precision),
                found: format!("precision={}", other.precision),
            });
        }

        for (a, &b) in self.registers.iter_mut().zip(other.registers.iter()) {
            *a = (*a).max(b);
        }
        self.count += other.count;
        Ok(())
    }

    fn clear(&mut self) {
        self.registers.fill(0);
        self.count = 0;
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl CardinalitySketch for HyperLogLog {
    fn estimate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.small_range_correction(self.raw_estimate())
    }

    fn error_bounds(&self, confidence: f64) -> ErrorBounds {
        let estimate = self.estimate();
        let z = match confidence {
            c if c >= 0.99 => 2.576,
            c if c >= 0.95 => 1.96,
            c if c >= 0.90 => 1.645,
            c if c >= 0.80 => 1.282,
            _ => 1.0,
        };

        let margin = z * self.relative_error() * estimate;
        ErrorBounds::new(
            (estimate - margin).max(0.0),
            estimate,
            estimate + margin,
            confidence,
        )
    }

    fn relative_error(&self) -> f64 {
        super::error_for_precision(self.precision)
    }
}

impl Estimator for HyperLogLog {
    type Sketch = HyperLogLog;

    fn observe(&mut self, value: f64) {
        self.insert_f64(value);
    }

    fn mergeable_state(&self) -> HyperLogLog {
        self.clone()
    }

    fn merge(left: &HyperLogLog, right: &HyperLogLog) -> Result<HyperLogLog, MergeError> {
        let mut merged = left.clone();
        Sketch::merge(&mut merged, right)?;
        Ok(merged)
    }
}

impl CardinalityEstimator for HyperLogLog {
    fn finalize(sketch: &HyperLogLog) -> u64 {
        math::round(sketch.estimate()) as u64
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for HyperLogLog {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("HyperLogLog", 3)?;
        state.serialize_field("precision", &self.precision)?;
        state.serialize_field("registers", &self.registers)?;
        state.serialize_field("count", &self.count)?;
        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for HyperLogLog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct HllData {
            precision: u8,
            registers: Vec<u8>,
            count: u64,
        }

        let data = HllData::deserialize(deserializer)?;
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&data.precision)
            || data.registers.len() != 1usize << data.precision
        {
            return Err(serde::de::Error::custom(format!(
                "register count {} does not match precision {}",
                data.registers.len(),
                data.precision
            )));
        }
        Ok(HyperLogLog {
            precision: data.precision,
            registers: data.registers,
            count: data.count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(precision: u8, values: impl IntoIterator<Item = f64>) -> HyperLogLog {
        let mut hll = HyperLogLog::new(precision);
        for v in values {
            hll.insert_f64(v);
        }
        hll
    }

    #[test]
    fn test_basic() {
        let hll = filled(12, (0..10_000).map(|i| i as f64 * 0.5));
        let estimate = hll.estimate();
        assert!(estimate > 9_000.0 && estimate < 11_000.0, "estimate={}", estimate);
    }

    #[test]
    fn test_empty() {
        let hll = HyperLogLog::new(12);
        assert_eq!(hll.estimate(), 0.0);
        assert_eq!(<HyperLogLog as CardinalityEstimator>::finalize(&hll), 0);
    }

    #[test]
    fn test_duplicates() {
        let hll = filled(12, core::iter::repeat(3.25).take(10_000));
        assert_eq!(<HyperLogLog as CardinalityEstimator>::finalize(&hll), 1);
    }

    #[test]
    fn test_signed_zero_counts_once() {
        let hll = filled(12, [0.0, -0.0, 0.0]);
        assert_eq!(<HyperLogLog as CardinalityEstimator>::finalize(&hll), 1);
    }

    #[test]
    fn test_nan_ignored() {
        let hll = filled(12, [1.0, f64::NAN, 2.0]);
        assert_eq!(hll.count(), 2);
    }

    #[test]
    fn test_small_cardinalities() {
        let hll = filled(14, (0..100).map(|i| i as f64));
        let estimate = hll.estimate();
        assert!(estimate > 95.0 && estimate < 105.0, "estimate={}", estimate);
    }

    #[test]
    fn test_merge_is_exact() {
        let left = filled(12, (0..3_000).map(|i| i as f64));
        let right = filled(12, (2_000..6_000).map(|i| i as f64));
        let whole = filled(12, (0..3_000).chain(2_000..6_000).map(|i| i as f64));

        let merged = <HyperLogLog as Estimator>::merge(&left, &right).unwrap();
        assert_eq!(merged.registers, whole.registers);
        assert_eq!(merged.count(), 7_000);
        assert_eq!(merged.estimate(), whole.estimate());
    }

    #[test]
    fn test_merge_incompatible() {
        let mut hll1 = HyperLogLog::new(12);
        let hll2 = HyperLogLog::new(14);

        assert!(Sketch::merge(&mut hll1, &hll2).is_err());
        assert!(<HyperLogLog as Estimator>::merge(&hll1, &hll2).is_err());
    }

    #[test]
    fn test_mergeable_state_is_detached() {
        let mut hll = filled(10, [1.0, 2.0]);
        let state = hll.mergeable_state();
        hll.observe(3.0);

        assert_eq!(state.count(), 2);
        assert_eq!(hll.count(), 3);
    }

    #[test]
    fn test_error_bounds() {
        let hll = filled(14, (0..100_000).map(|i| i as f64));
        let bounds = hll.error_bounds(0.95);

        assert!(bounds.lower < bounds.estimate);
        assert!(bounds.estimate < bounds.upper);
        assert!(bounds.lower < 110_000.0);
        assert!(bounds.upper > 90_000.0);
    }

    #[test]
    fn test_clear() {
        let mut hll = filled(12, (0..1000).map(|i| i as f64));
        assert!(hll.estimate() > 0.0);

        hll.clear();
        assert_eq!(hll.estimate(), 0.0);
        assert!(hll.is_empty());
    }

    #[test]
    fn test_default_precision() {
        let hll = HyperLogLog::default();
        assert_eq!(hll.precision(), 14);
        assert_eq!(hll.num_registers(), 16384);
    }

    #[test]
    #[should_panic(expected = "precision must be between 4 and 18")]
    fn test_precision_out_of_range() {
        HyperLogLog::new(3);
    }
}
