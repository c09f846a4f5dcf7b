//! Correctness and invariant tests for opstats
//!
//! These tests check the properties partitioned computation relies on:
//! combining partial results must agree with one pass over all the data,
//! whatever the partitioning and whatever the order of combination.
//!
//! Run with: cargo test --test correctness --features full

#[cfg(not(feature = "extended"))]
compile_error!(
    "Correctness tests require the extended feature. Run: cargo test --test correctness --features full"
);

use opstats::aggregate::{aggregate, aggregate_tree};
use opstats::extended::{aggregate_extended, ExtendedAccumulator, ExtendedConfig};
use opstats::statistics::{
    aggregate_covariance, aggregate_moments, CovarianceAccumulator, CovarianceSnapshot,
    MomentAccumulator, MomentSnapshot, StatsConfig,
};
use opstats::traits::StatsError;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Right-skewed values so third and fourth moments are far from zero
fn random_values(seed: u64, n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| rng.random_range(-5.0..5.0) + rng.random::<f64>().powi(3) * 100.0)
        .collect()
}

/// Split `values` at random points into `parts` contiguous, possibly empty, slices
fn random_partitions<T>(seed: u64, values: &[T], parts: usize) -> Vec<&[T]> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cuts: Vec<usize> = (1..parts).map(|_| rng.random_range(0..=values.len())).collect();
    cuts.sort_unstable();

    let mut slices = Vec::with_capacity(parts);
    let mut start = 0;
    for cut in cuts.into_iter().chain(core::iter::once(values.len())) {
        slices.push(&values[start..cut]);
        start = cut;
    }
    slices
}

fn moments_of(values: &[f64]) -> MomentSnapshot {
    let mut acc = MomentAccumulator::new();
    acc.add_all(values.iter().copied()).unwrap();
    acc.snapshot()
}

fn covariance_of(pairs: &[(f64, f64)]) -> CovarianceSnapshot {
    let mut acc = CovarianceAccumulator::new();
    acc.add_all(pairs.iter().copied()).unwrap();
    acc.snapshot()
}

fn assert_close(actual: f64, expected: f64, rel: f64, what: &str) {
    let tolerance = rel * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "{}: {} vs {} (tolerance {})",
        what,
        actual,
        expected,
        tolerance
    );
}

fn assert_moments_close(actual: &MomentSnapshot, expected: &MomentSnapshot) {
    assert_eq!(actual.count(), expected.count());
    assert_close(actual.mean(), expected.mean(), 1e-10, "mean");
    assert_close(actual.m2(), expected.m2(), 1e-9, "m2");
    assert_close(actual.m3(), expected.m3(), 1e-8, "m3");
    assert_close(actual.m4(), expected.m4(), 1e-8, "m4");
}

// ============================================================================
// Moments
// ============================================================================

mod moments {
    use super::*;

    /// Mean and central-moment sums computed the slow way
    fn two_pass(values: &[f64]) -> (f64, f64, f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for &v in values {
            let d = v - mean;
            m2 += d * d;
            m3 += d * d * d;
            m4 += d * d * d * d;
        }
        (mean, m2, m3, m4)
    }

    #[test]
    fn one_to_ten_split_in_two() {
        let left = moments_of(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let right = moments_of(&[6.0, 7.0, 8.0, 9.0, 10.0]);

        let stats = aggregate_moments(&[left, right])
            .unwrap()
            .stats(&StatsConfig::default());

        assert_eq!(stats.count, 10);
        assert!((stats.mean - 5.5).abs() < 1e-12);
        assert!((stats.variance - 9.1667).abs() < 1e-4);
        assert!(stats.skewness.abs() < 1e-12);
        assert!((stats.kurtosis + 1.2242).abs() < 1e-4);
    }

    #[test]
    fn matches_two_pass_reference() {
        let values = random_values(7, 5_000);
        let snapshot = moments_of(&values);
        let (mean, m2, m3, m4) = two_pass(&values);

        assert_eq!(snapshot.count(), 5_000);
        assert_close(snapshot.mean(), mean, 1e-10, "mean");
        assert_close(snapshot.m2(), m2, 1e-9, "m2");
        assert_close(snapshot.m3(), m3, 1e-8, "m3");
        assert_close(snapshot.m4(), m4, 1e-8, "m4");
    }

    #[test]
    fn random_partitions_match_single_pass() {
        for seed in 0..10 {
            let values = random_values(seed, 1_000);
            let expected = moments_of(&values);

            let snapshots: Vec<_> = random_partitions(seed + 100, &values, 7)
                .into_iter()
                .map(moments_of)
                .collect();

            let folded = aggregate_moments(&snapshots).unwrap();
            let tree = aggregate_tree(&snapshots).unwrap();
            assert_moments_close(&folded, &expected);
            assert_moments_close(&tree, &expected);
        }
    }

    #[test]
    fn combine_is_commutative() {
        let a = moments_of(&random_values(1, 300));
        let b = moments_of(&random_values(2, 500));

        assert_moments_close(&a.combine(&b), &b.combine(&a));
    }

    #[test]
    fn combine_is_associative() {
        let a = moments_of(&random_values(3, 100));
        let b = moments_of(&random_values(4, 1));
        let c = moments_of(&random_values(5, 900));

        let ab_c = a.combine(&b).combine(&c);
        let a_bc = a.combine(&b.combine(&c));
        assert_moments_close(&ab_c, &a_bc);
    }

    #[test]
    fn empty_is_identity() {
        let a = moments_of(&random_values(6, 50));
        let empty = MomentSnapshot::empty();

        assert_eq!(a.combine(&empty), a);
        assert_eq!(empty.combine(&a), a);
        assert_eq!(empty.combine(&empty), empty);
    }

    #[test]
    fn empty_aggregation_is_error() {
        assert_eq!(aggregate_moments(&[]), Err(StatsError::EmptyAggregation));
        assert_eq!(aggregate_tree::<MomentSnapshot>(&[]), Err(StatsError::EmptyAggregation));
    }

    #[test]
    fn threaded_reduction() {
        let values = random_values(8, 40_000);
        let expected = moments_of(&values);

        let snapshots: Vec<MomentSnapshot> = std::thread::scope(|scope| {
            let workers: Vec<_> = values
                .chunks(values.len() / 8)
                .map(|chunk| scope.spawn(move || moments_of(chunk)))
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().unwrap())
                .collect()
        });

        assert_eq!(snapshots.len(), 8);
        assert_moments_close(&aggregate(&snapshots).unwrap(), &expected);
    }

    #[test]
    fn add_all_stops_at_rejected_value() {
        let mut acc = MomentAccumulator::new();
        acc.add_all([1.0, 2.0, 3.0]).unwrap();

        let result = acc.add_all([4.0, f64::NAN, 5.0]);
        assert!(matches!(result, Err(StatsError::InvalidInput { .. })));

        // values before the rejected one are kept
        assert_eq!(acc.len(), 4);
        assert_eq!(acc.snapshot(), moments_of(&[1.0, 2.0, 3.0, 4.0]));
    }
}

// ============================================================================
// Covariance
// ============================================================================

mod covariance {
    use super::*;

    fn random_pairs(seed: u64, n: usize) -> Vec<(f64, f64)> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let x = rng.random_range(-10.0..10.0);
                (x, 0.5 * x + rng.random_range(-3.0..3.0))
            })
            .collect()
    }

    fn two_pass_comoment(pairs: &[(f64, f64)]) -> f64 {
        let n = pairs.len() as f64;
        let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
        pairs.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum()
    }

    #[test]
    fn five_pairs() {
        let snapshot = covariance_of(&[(1.0, 2.0), (2.0, 4.0), (3.0, 5.0), (4.0, 4.0), (5.0, 5.0)]);

        assert_eq!(snapshot.count(), 5);
        assert!((snapshot.covariance() - 1.5).abs() < 1e-12);
        assert!((snapshot.population_covariance() - 1.2).abs() < 1e-12);
        assert!((snapshot.correlation() - 6.0 / 60f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn matches_two_pass_reference() {
        let pairs = random_pairs(11, 5_000);
        let snapshot = covariance_of(&pairs);

        assert_close(snapshot.comoment(), two_pass_comoment(&pairs), 1e-9, "comoment");
    }

    #[test]
    fn random_partitions_match_single_pass() {
        for seed in 0..10 {
            let pairs = random_pairs(seed, 1_000);
            let expected = covariance_of(&pairs);

            let snapshots: Vec<_> = random_partitions(seed + 200, &pairs, 5)
                .into_iter()
                .map(covariance_of)
                .collect();

            for merged in [
                aggregate_covariance(&snapshots).unwrap(),
                aggregate_tree(&snapshots).unwrap(),
            ] {
                assert_eq!(merged.count(), expected.count());
                assert_close(merged.comoment(), expected.comoment(), 1e-9, "comoment");
                assert_close(merged.correlation(), expected.correlation(), 1e-9, "correlation");
                assert_moments_close(merged.moments_x(), expected.moments_x());
                assert_moments_close(merged.moments_y(), expected.moments_y());
            }
        }
    }

    #[test]
    fn correlation_stays_in_range() {
        for seed in 0..20 {
            let pairs = random_pairs(seed, 10);
            let r = covariance_of(&pairs).correlation();
            assert!((-1.0..=1.0).contains(&r), "correlation {} out of range", r);
        }
    }

    #[test]
    fn empty_is_identity() {
        let a = covariance_of(&random_pairs(3, 40));
        let empty = CovarianceSnapshot::empty();

        assert_eq!(a.combine(&empty), a);
        assert_eq!(empty.combine(&a), a);
    }
}

// ============================================================================
// Extended
// ============================================================================

mod extended {
    use super::*;

    /// Integer-valued data with a known number of distinct values
    fn bucketed_values(seed: u64, n: usize, buckets: u32) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| f64::from(rng.random_range(0..buckets)))
            .collect()
    }

    #[test]
    fn partitioned_round_trip() {
        let values = bucketed_values(21, 20_000, 700);

        let mut single = ExtendedAccumulator::new();
        single.add_all(values.iter().copied()).unwrap();
        let expected = single.calculate();

        let intermediates: Vec<_> = random_partitions(22, &values, 6)
            .into_iter()
            .map(|part| {
                let mut acc = ExtendedAccumulator::new();
                acc.add_all(part.iter().copied()).unwrap();
                acc.get_parallel()
            })
            .collect();
        let actual = aggregate_extended(&intermediates).unwrap().calculate();

        assert_eq!(actual.count, expected.count);
        assert_close(actual.mean, expected.mean, 1e-10, "mean");
        assert_close(actual.variance, expected.variance, 1e-9, "variance");
        // register-wise max makes the merged sketch identical to the single-pass one
        assert_eq!(actual.cardinality, expected.cardinality);
        assert!(
            (actual.cardinality as f64 - 700.0).abs() < 700.0 * 0.05,
            "cardinality {}",
            actual.cardinality
        );
        assert!(
            (actual.median - 349.5).abs() < 700.0 * 0.02,
            "median {}",
            actual.median
        );
        assert!(
            (actual.interquartile_range - 350.0).abs() < 700.0 * 0.04,
            "iqr {}",
            actual.interquartile_range
        );
    }

    #[test]
    fn tree_and_fold_agree() {
        let values = bucketed_values(23, 5_000, 100);
        let intermediates: Vec<_> = values
            .chunks(700)
            .map(|chunk| {
                let mut acc = ExtendedAccumulator::new();
                acc.add_all(chunk.iter().copied()).unwrap();
                acc.get_parallel()
            })
            .collect();

        let folded = aggregate_extended(&intermediates).unwrap();
        let tree = aggregate_tree(&intermediates).unwrap();

        assert_moments_close(folded.moments(), tree.moments());
        assert_eq!(folded.cardinality_sketch(), tree.cardinality_sketch());
        assert_eq!(folded.calculate().cardinality, tree.calculate().cardinality);
    }

    #[test]
    fn percentiles_are_ordered() {
        let mut acc = ExtendedAccumulator::new();
        acc.add_all(random_values(24, 10_000)).unwrap();

        let requested: Vec<u8> = (0..=100).step_by(5).collect();
        let result = acc
            .get_parallel()
            .calculate_with(&StatsConfig::default(), &requested)
            .unwrap();

        assert_eq!(result.percentiles.len(), requested.len());
        for pair in result.percentiles.windows(2) {
            assert!(pair[0].1 <= pair[1].1, "{:?} then {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn mismatched_precision_fails_to_merge() {
        let mut a = ExtendedAccumulator::with_config(ExtendedConfig::default().with_error_rate(0.02));
        let mut b = ExtendedAccumulator::new();
        a.add(1.0).unwrap();
        b.add(2.0).unwrap();

        let result = aggregate_extended(&[a.get_parallel(), b.get_parallel()]);
        assert!(matches!(result, Err(StatsError::Merge(_))));
    }
}

// ============================================================================
// Serialization
// ============================================================================

#[cfg(feature = "serde")]
mod serialization {
    use super::*;
    use opstats::extended::ExtendedIntermediate;
    use opstats::traits::Aggregate;

    #[test]
    fn moment_snapshot_round_trip() {
        let snapshot = moments_of(&random_values(31, 200));
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: MomentSnapshot = serde_json::from_str(&json).unwrap();

        assert_moments_close(&restored, &snapshot);
    }

    #[test]
    fn covariance_snapshot_round_trip() {
        let snapshot = covariance_of(&[(1.0, 2.0), (2.0, 4.0), (3.0, 5.0)]);
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: CovarianceSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.count(), 3);
        assert_close(restored.comoment(), snapshot.comoment(), 1e-12, "comoment");
    }

    #[test]
    fn extended_intermediate_round_trip() {
        let mut left = ExtendedAccumulator::new();
        let mut right = ExtendedAccumulator::new();
        left.add_all((0..500).map(f64::from)).unwrap();
        right.add_all((250..1000).map(f64::from)).unwrap();

        let json = serde_json::to_string(&left.get_parallel()).unwrap();
        let restored: ExtendedIntermediate = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.cardinality_sketch(), left.get_parallel().cardinality_sketch());

        let merged = restored.combine(&right.get_parallel()).unwrap();
        let result = merged.calculate();
        assert_eq!(result.count, 1250);
        assert!(
            (result.cardinality as f64 - 1000.0).abs() < 50.0,
            "cardinality {}",
            result.cardinality
        );
    }

    #[test]
    fn empty_intermediate_round_trip() {
        let empty = ExtendedAccumulator::new().get_parallel();
        let json = serde_json::to_string(&empty).unwrap();
        let restored: ExtendedIntermediate = serde_json::from_str(&json).unwrap();

        let result = restored.calculate();
        assert_eq!(result.count, 0);
        assert_eq!(result.median, 0.0);
    }
}
