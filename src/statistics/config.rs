//! Reporting options for derived statistics
//!
//! Snapshots store raw moment sums only. How those sums are turned into a
//! variance or a skewness is chosen at read time through [`StatsConfig`], so
//! snapshots computed under different options still merge exactly.

/// Divisor used when normalizing second moments
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarianceKind {
    /// Bessel-corrected, divides by `n - 1`
    #[default]
    Sample,
    /// Divides by `n`
    Population,
}

/// Options for turning snapshots into reported statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsConfig {
    /// Sample or population variance (and covariance)
    pub variance: VarianceKind,
    /// Report adjusted Fisher-Pearson skewness and kurtosis
    pub bias_adjust: bool,
}

impl StatsConfig {
    /// Sample variance, unadjusted shape statistics
    pub fn sample() -> Self {
        Self::default()
    }

    /// Population variance, unadjusted shape statistics
    pub fn population() -> Self {
        Self {
            variance: VarianceKind::Population,
            bias_adjust: false,
        }
    }

    /// Toggle bias adjustment of skewness and kurtosis
    pub fn with_bias_adjust(mut self, bias_adjust: bool) -> Self {
        self.bias_adjust = bias_adjust;
        self
    }

    /// Normalize a second-moment sum over `count` observations
    pub(crate) fn normalize(&self, sum: f64, count: u64) -> f64 {
        match self.variance {
            VarianceKind::Sample if count >= 2 => sum / (count - 1) as f64,
            VarianceKind::Population if count >= 1 => sum / count as f64,
            _ => 0.0,
        }
    }
}
