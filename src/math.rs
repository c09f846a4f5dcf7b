//! Math function wrappers for std/no_std compatibility
//!
//! Uses standard library math when available, falls back to libm for no_std.

#[cfg(feature = "std")]
#[inline]
pub fn sqrt(x: f64) -> f64 {
    x.sqrt()
}

#[cfg(not(feature = "std"))]
#[inline]
pub fn sqrt(x: f64) -> f64 {
    libm::sqrt(x)
}

#[cfg(all(feature = "std", feature = "cardinality"))]
#[inline]
pub fn ln(x: f64) -> f64 {
    x.ln()
}

#[cfg(all(not(feature = "std"), feature = "cardinality"))]
#[inline]
pub fn ln(x: f64) -> f64 {
    libm::log(x)
}

#[cfg(all(feature = "std", feature = "cardinality"))]
#[inline]
pub fn log2(x: f64) -> f64 {
    x.log2()
}

#[cfg(all(not(feature = "std"), feature = "cardinality"))]
#[inline]
pub fn log2(x: f64) -> f64 {
    libm::log2(x)
}

#[cfg(all(feature = "std", feature = "cardinality"))]
#[inline]
pub fn exp2(x: f64) -> f64 {
    x.exp2()
}

#[cfg(all(not(feature = "std"), feature = "cardinality"))]
#[inline]
pub fn exp2(x: f64) -> f64 {
    libm::exp2(x)
}

#[cfg(all(feature = "std", feature = "cardinality"))]
#[inline]
pub fn ceil(x: f64) -> f64 {
    x.ceil()
}

#[cfg(all(not(feature = "std"), feature = "cardinality"))]
#[inline]
pub fn ceil(x: f64) -> f64 {
    libm::ceil(x)
}

#[cfg(all(feature = "std", feature = "cardinality"))]
#[inline]
pub fn round(x: f64) -> f64 {
    x.round()
}

#[cfg(all(not(feature = "std"), feature = "cardinality"))]
#[inline]
pub fn round(x: f64) -> f64 {
    libm::round(x)
}

#[cfg(all(feature = "std", feature = "quantiles"))]
#[inline]
pub fn asin(x: f64) -> f64 {
    x.asin()
}

#[cfg(all(not(feature = "std"), feature = "quantiles"))]
#[inline]
pub fn asin(x: f64) -> f64 {
    libm::asin(x)
}
