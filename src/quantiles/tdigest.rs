//! t-digest quantile estimator
//!
//! Values are buffered and periodically folded into weighted centroids whose
//! size is bounded by the arcsine scale function, which keeps the tails
//! precise. Two digests merge by pooling their centroids and recompressing.

use crate::math;
use crate::traits::{Estimator, MergeError, QuantileEstimator, QuantileSketch, Sketch};

#[cfg(feature = "std")]
use std::{borrow::Cow, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{borrow::Cow, format, vec::Vec};

/// A centroid in the t-digest
///
/// Centroids represent clusters of values with a mean and count.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Centroid {
    /// Mean value of the centroid
    pub mean: f64,
    /// Number of values in the centroid
    pub weight: u64,
}

impl Centroid {
    /// Create a centroid
    pub fn new(mean: f64, weight: u64) -> Self {
        Self { mean, weight }
    }

    /// Absorb another cluster, updating the weighted mean
    fn absorb(&mut self, other: &Centroid) {
        let weight = self.weight + other.weight;
        self.mean += (other.mean - self.mean) * other.weight as f64 / weight as f64;
        self.weight = weight;
    }
}

/// t-digest quantile sketch
///
/// - O(1) amortized insertion
/// - accurate estimates at the tails (p01, p99)
/// - mergeable across partitions
/// - memory bounded by the compression parameter
///
/// Higher compression keeps more centroids: better accuracy, more memory.
/// Typical values are 100 to 500.
///
/// # Example
///
/// ```
/// use opstats::quantiles::TDigest;
/// use opstats::traits::QuantileSketch;
///
/// let mut digest = TDigest::new(100.0);
/// for i in 1..=1000 {
///     digest.add(i as f64);
/// }
///
/// let p50 = digest.quantile(0.5).unwrap();
/// assert!(p50 > 450.0 && p50 < 550.0);
/// ```
#[derive(Clone, Debug)]
pub struct TDigest {
    compression: f64,
    /// Sorted by mean
    centroids: Vec<Centroid>,
    /// Values not yet folded into centroids
    buffer: Vec<f64>,
    buffer_capacity: usize,
    count: u64,
    min: f64,
    max: f64,
}

impl TDigest {
    /// Create a new t-digest with the given compression parameter
    ///
    /// # Panics
    ///
    /// Panics if `compression` is not finite or not positive.
    pub fn new(compression: f64) -> Self {
        assert!(
            compression.is_finite() && compression > 0.0,
            "compression must be finite and positive, got {}",
            compression
        );

        let buffer_capacity = ((compression * 2.0) as usize).max(1);
        Self {
            compression,
            centroids: Vec::new(),
            buffer: Vec::with_capacity(buffer_capacity),
            buffer_capacity,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Get the compression parameter
    pub fn compression(&self) -> f64 {
        self.compression
    }

    /// Number of centroids once the buffer is folded in
    pub fn num_centroids(&self) -> usize {
        self.merged_centroids().len()
    }

    /// Add a value
    ///
    /// NaN values are ignored.
    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }

        self.buffer.push(value);
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        if self.buffer.len() >= self.buffer_capacity {
            self.compress();
        }
    }

    /// Fold buffered values into the centroids
    pub fn compress(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        self.centroids = self.merged_centroids().into_owned();
        self.buffer.clear();
    }

    /// Centroids with the buffer folded in, without touching `self`
    fn merged_centroids(&self) -> Cow<'_, [Centroid]> {
        if self.buffer.is_empty() {
            return Cow::Borrowed(&self.centroids);
        }

        let mut all: Vec<Centroid> = self.centroids.clone();
        all.extend(self.buffer.iter().map(|&v| Centroid::new(v, 1)));
        all.sort_by(|a, b| a.mean.total_cmp(&b.mean));
        Cow::Owned(compress_sorted(all, self.compression))
    }
}

/// Greedily merge adjacent centroids while the cluster spans at most one
/// unit of the scale function
fn compress_sorted(sorted: Vec<Centroid>, compression: f64) -> Vec<Centroid> {
    let total_weight: u64 = sorted.iter().map(|c| c.weight).sum();
    let mut iter = sorted.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut result = Vec::new();
    let mut weight_so_far = 0u64;
    for centroid in iter {
        let q0 = weight_so_far as f64 / total_weight as f64;
        let q1 = (weight_so_far + current.weight + centroid.weight) as f64 / total_weight as f64;

        if scale(q1, compression) - scale(q0, compression) <= 1.0 {
            current.absorb(&centroid);
        } else {
            weight_so_far += current.weight;
            result.push(core::mem::replace(&mut current, centroid));
        }
    }
    result.push(current);
    result
}

/// Arcsine scale function, argument clamped against rounding drift
#[inline]
fn scale(q: f64, compression: f64) -> f64 {
    let x = (2.0 * q - 1.0).clamp(-1.0, 1.0);
    compression * (math::asin(x) / core::f64::consts::PI + 0.5)
}

/// Piecewise-linear inverse CDF through the centroid midpoints, anchored at
/// `(0, min)` and `(count, max)`
fn quantile_of(centroids: &[Centroid], count: u64, min: f64, max: f64, q: f64) -> Option<f64> {
    if count == 0 {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    if q <= 0.0 {
        return Some(min);
    }
    if q >= 1.0 {
        return Some(max);
    }

    let target = q * count as f64;
    let mut prev_rank = 0.0_f64;
    let mut prev_value = min;
    let mut cumulative = 0.0_f64;

    for centroid in centroids {
        let mid_rank = cumulative + centroid.weight as f64 / 2.0;
        if target < mid_rank {
            let span = mid_rank - prev_rank;
            if span <= 0.0 {
                return Some(prev_value);
            }
            let t = (target - prev_rank) / span;
            return Some(prev_value + t * (centroid.mean - prev_value));
        }
        cumulative += centroid.weight as f64;
        prev_rank = mid_rank;
        prev_value = centroid.mean;
    }

    let span = count as f64 - prev_rank;
    if span <= 0.0 {
        return Some(max);
    }
    let t = (target - prev_rank) / span;
    Some(prev_value + t * (max - prev_value))
}

/// Inverse of [`quantile_of`] over the same piecewise-linear model
fn rank_of(centroids: &[Centroid], count: u64, min: f64, max: f64, value: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    // checked before `<= min` so a constant stream gives P(X <= x) = 1
    if value >= max {
        return 1.0;
    }
    if value <= min {
        return 0.0;
    }

    let mut prev_rank = 0.0_f64;
    let mut prev_value = min;
    let mut cumulative = 0.0_f64;

    for centroid in centroids {
        let mid_rank = cumulative + centroid.weight as f64 / 2.0;
        if value < centroid.mean {
            let span = centroid.mean - prev_value;
            if span <= 0.0 {
                return prev_rank / count as f64;
            }
            let t = (value - prev_value) / span;
            return (prev_rank + t * (mid_rank - prev_rank)) / count as f64;
        }
        cumulative += centroid.weight as f64;
        prev_rank = mid_rank;
        prev_value = centroid.mean;
    }

    let span = max - prev_value;
    if span <= 0.0 {
        return 1.0;
    }
    let t = (value - prev_value) / span;
    (prev_rank + t * (count as f64 - prev_rank)) / count as f64
}

impl Default for TDigest {
    fn default() -> Self {
        Self::new(super::DEFAULT_COMPRESSION)
    }
}

impl Sketch for TDigest {
    type Item = f64;

    fn update(&mut self, item: &f64) {
        self.add(*item);
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        // relative tolerance survives serialization round trips
        let avg = (self.compression + other.compression) * 0.5;
        let diff = self.compression - other.compression;
        let abs_diff = if diff < 0.0 { -diff } else { diff };
        if abs_diff / avg > 1e-6 {
            return Err(MergeError::IncompatibleConfig {
                expected: format!("compression={}", self.compression),
                found: format!("compression={}", other.compression),
            });
        }

        let mut all = self.merged_centroids().into_owned();
        all.extend(other.merged_centroids().iter().cloned());
        all.sort_by(|a, b| a.mean.total_cmp(&b.mean));

        self.centroids = compress_sorted(all, self.compression);
        self.buffer.clear();
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        Ok(())
    }

    fn clear(&mut self) {
        self.centroids.clear();
        self.buffer.clear();
        self.count = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl QuantileSketch for TDigest {
    fn quantile(&self, rank: f64) -> Option<f64> {
        quantile_of(&self.merged_centroids(), self.count, self.min, self.max, rank)
    }

    fn rank(&self, value: f64) -> f64 {
        rank_of(&self.merged_centroids(), self.count, self.min, self.max, value)
    }
}

impl Estimator for TDigest {
    type Sketch = TDigest;

    fn observe(&mut self, value: f64) {
        self.add(value);
    }

    /// Compressed copy of the digest
    fn mergeable_state(&self) -> TDigest {
        let mut state = self.clone();
        state.compress();
        state
    }

    fn merge(left: &TDigest, right: &TDigest) -> Result<TDigest, MergeError> {
        let mut merged = left.clone();
        Sketch::merge(&mut merged, right)?;
        Ok(merged)
    }
}

impl QuantileEstimator for TDigest {
    fn finalize(sketch: &TDigest, rank: f64) -> Option<f64> {
        sketch.quantile(rank)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let empty = self.count == 0;
        let mut state = serializer.serialize_struct("TDigest", 5)?;
        state.serialize_field("compression", &self.compression)?;
        state.serialize_field("centroids", &*self.merged_centroids())?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("min", &(!empty).then_some(self.min))?;
        state.serialize_field("max", &(!empty).then_some(self.max))?;
        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for TDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct DigestData {
            compression: f64,
            centroids: Vec<Centroid>,
            count: u64,
            min: Option<f64>,
            max: Option<f64>,
        }

        let data = DigestData::deserialize(deserializer)?;
        if !(data.compression.is_finite() && data.compression > 0.0) {
            return Err(serde::de::Error::custom("compression must be finite and positive"));
        }
        let weight = data
            .centroids
            .iter()
            .try_fold(0u64, |acc, c| acc.checked_add(c.weight));
        if weight != Some(data.count) {
            return Err(serde::de::Error::custom(format!(
                "centroid weight does not match count {}",
                data.count
            )));
        }
        if data.centroids.iter().any(|c| !c.mean.is_finite()) {
            return Err(serde::de::Error::custom("centroid means must be finite"));
        }
        if data.centroids.windows(2).any(|w| w[0].mean > w[1].mean) {
            return Err(serde::de::Error::custom("centroids must be sorted by mean"));
        }

        let (min, max) = match (data.count, data.min, data.max) {
            (0, _, _) => (f64::INFINITY, f64::NEG_INFINITY),
            (_, Some(min), Some(max)) if min.is_finite() && max.is_finite() && min <= max => {
                (min, max)
            }
            _ => {
                return Err(serde::de::Error::custom(
                    "non-empty digest needs finite min and max with min <= max",
                ))
            }
        };

        let mut digest = TDigest::new(data.compression);
        digest.centroids = data.centroids;
        digest.count = data.count;
        digest.min = min;
        digest.max = max;
        Ok(digest)
    }
}
