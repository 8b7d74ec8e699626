//! Property and Monte Carlo checks for the inference engine.

use ab_evidence::stats::{
    Statistics, compute_statistics, describe, meets_minimum_sample_size,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_sample_size_gate_is_conjunction(a in 0usize..20, b in 0usize..20, m in 0usize..20) {
        prop_assert_eq!(meets_minimum_sample_size(a, b, m), a >= m && b >= m);
    }

    #[test]
    fn prop_interval_brackets_delta(
        a in prop::collection::vec(-100.0f64..100.0, 2..40),
        b in prop::collection::vec(-100.0f64..100.0, 2..40),
    ) {
        let stats = compute_statistics(&a, &b).expect("finite inputs");
        let bundle = stats.bundle().expect("both groups have >= 2 values");
        prop_assert!(bundle.ci.lower <= bundle.delta, "{:?}", bundle);
        prop_assert!(bundle.delta <= bundle.ci.upper, "{:?}", bundle);
    }

    #[test]
    fn prop_shared_constant_means_no_effect(
        c in -1.0e6f64..1.0e6,
        n_a in 2usize..60,
        n_b in 2usize..60,
    ) {
        let stats = compute_statistics(&vec![c; n_a], &vec![c; n_b]).expect("constant groups");
        let bundle = stats.bundle().expect("computed");
        prop_assert_eq!(bundle.delta, 0.0);
        prop_assert_eq!(bundle.effect_size, 0.0);
        prop_assert!(bundle.ci.contains(0.0));
        prop_assert!(bundle.degrees_of_freedom.is_none());
    }

    #[test]
    fn prop_any_group_below_two_is_insufficient(
        a in prop::collection::vec(-1.0f64..1.0, 0..2),
        b in prop::collection::vec(-1.0f64..1.0, 0..10),
    ) {
        let stats = compute_statistics(&a, &b).expect("never an error");
        prop_assert_eq!(stats, Statistics::Insufficient { n_a: a.len(), n_b: b.len() });
    }
}

#[test]
fn describe_one_through_five() {
    let d = describe(&[1.0, 2.0, 3.0, 4.0, 5.0]).expect("described");
    assert!((d.mean - 3.0).abs() < 1e-12);
    assert!((d.variance - 2.5).abs() < 1e-12);
    assert!((d.std_dev - 2.5_f64.sqrt()).abs() < 1e-12);
    assert_eq!(d.count, 5);
}

#[test]
fn single_observations_are_insufficient() {
    let stats = compute_statistics(&[0.5], &[0.7]).expect("no error");
    assert!(stats.is_insufficient());
    let stats = compute_statistics(&[0.5], &[0.7, 0.9]).expect("no error");
    assert!(stats.is_insufficient());
}

#[test]
fn constant_groups_with_known_difference() {
    let stats = compute_statistics(&[0.5; 100], &[0.7; 100]).expect("stats");
    let bundle = stats.bundle().expect("computed");
    assert!((bundle.delta - 0.2).abs() < 1e-9);
    assert!(bundle.mean_b > bundle.mean_a);
    assert!(bundle.ci.lower > 0.0 || bundle.ci.upper < 0.0);
}

#[test]
fn welch_interval_has_nominal_coverage() {
    let mut rng = StdRng::seed_from_u64(0x00ab_7e57);
    let a_dist = Normal::new(0.5, 0.1).expect("normal a");
    let b_dist = Normal::new(0.6, 0.1).expect("normal b");
    let true_delta = 0.1;
    let trials = 1000;

    let mut covered = 0;
    for _ in 0..trials {
        let a: Vec<f64> = (0..50).map(|_| a_dist.sample(&mut rng)).collect();
        let b: Vec<f64> = (0..50).map(|_| b_dist.sample(&mut rng)).collect();
        let stats = compute_statistics(&a, &b).expect("stats");
        if stats.bundle().expect("computed").ci.contains(true_delta) {
            covered += 1;
        }
    }

    let coverage = f64::from(covered) / f64::from(trials);
    assert!(
        (0.90..=0.99).contains(&coverage),
        "coverage {coverage} outside [0.90, 0.99]"
    );
}

#[test]
fn unequal_variances_widen_the_interval() {
    let mut rng = StdRng::seed_from_u64(17);
    let tight = Normal::new(0.0, 0.1).expect("tight");
    let loose = Normal::new(0.0, 1.0).expect("loose");
    let a: Vec<f64> = (0..30).map(|_| tight.sample(&mut rng)).collect();
    let b_tight: Vec<f64> = (0..30).map(|_| tight.sample(&mut rng)).collect();
    let b_loose: Vec<f64> = (0..30).map(|_| loose.sample(&mut rng)).collect();

    let narrow = compute_statistics(&a, &b_tight).expect("narrow");
    let wide = compute_statistics(&a, &b_loose).expect("wide");
    let narrow = narrow.bundle().expect("computed");
    let wide = wide.bundle().expect("computed");
    assert!(wide.ci.width() > narrow.ci.width());
    // Welch df stays near the loose group's n - 1 when one variance dominates.
    let df = wide.degrees_of_freedom.expect("df");
    assert!(df > 25.0 && df < 40.0, "df {df}");
}
