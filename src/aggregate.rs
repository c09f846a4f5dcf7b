//! Reduction of partial results
//!
//! Both reducers accept any [`Aggregate`] value. [`aggregate`] folds left to
//! right, carrying the running combination as the left operand. [`aggregate_tree`]
//! combines adjacent pairs level by level, the shape a parallel reduction
//! produces. The two agree up to floating-point rounding order.

use crate::traits::{Aggregate, StatsError};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Fold partial results left to right
///
/// A single item is returned unchanged. An empty slice is
/// [`StatsError::EmptyAggregation`].
pub fn aggregate<T>(items: &[T]) -> Result<T, StatsError>
where
    T: Aggregate + Clone,
{
    let (first, rest) = items.split_first().ok_or(StatsError::EmptyAggregation)?;
    log::debug!("aggregating {} partial results", items.len());

    rest.iter()
        .try_fold(first.clone(), |acc, item| acc.combine(item))
        .map_err(StatsError::from)
}

/// Combine partial results as a balanced binary tree
///
/// Same contract as [`aggregate`].
pub fn aggregate_tree<T>(items: &[T]) -> Result<T, StatsError>
where
    T: Aggregate + Clone,
{
    if items.is_empty() {
        return Err(StatsError::EmptyAggregation);
    }
    log::debug!("tree-aggregating {} partial results", items.len());

    let mut level: Vec<T> = items.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [left, right] => next.push(left.combine(right)?),
                [single] => next.push(single.clone()),
                _ => unreachable!("chunks(2) yields one or two items"),
            }
        }
        level = next;
    }

    level.pop().ok_or(StatsError::EmptyAggregation)
}
