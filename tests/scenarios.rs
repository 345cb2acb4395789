//! Integration-style scenario tests for `compute_ari` (spec.md §8).

use approx::assert_relative_eq;
use ari_gpu::{compute_ari, Context};

#[test]
fn scenario_identical_partitions() {
    let ctx = Context::try_default().unwrap();
    let parts = [0, 0, 1, 1, 0, 0, 1, 1];
    let out = compute_ari(&ctx, &parts, 2, 1, 4).unwrap();
    assert_eq!(out.len(), 1);
    assert_relative_eq!(out[0], 1.0, epsilon = 1e-5);
}

#[test]
fn scenario_label_permutation() {
    let ctx = Context::try_default().unwrap();
    let parts = [0, 0, 1, 1, 1, 1, 0, 0];
    let out = compute_ari(&ctx, &parts, 2, 1, 4).unwrap();
    assert_eq!(out.len(), 1);
    assert_relative_eq!(out[0], 1.0, epsilon = 1e-5);
}

#[test]
fn scenario_complete_pair_disagreement() {
    let ctx = Context::try_default().unwrap();
    let parts = [0, 0, 1, 1, 0, 1, 0, 1];
    let out = compute_ari(&ctx, &parts, 2, 1, 4).unwrap();
    assert_eq!(out.len(), 1);
    assert_relative_eq!(out[0], -0.5, epsilon = 1e-5);
}

#[test]
fn scenario_finite_middle_ground() {
    let ctx = Context::try_default().unwrap();
    let parts = [0, 0, 0, 1, 1, 1, 0, 0, 1, 1, 2, 2];
    let out = compute_ari(&ctx, &parts, 2, 1, 6).unwrap();
    assert_eq!(out.len(), 1);
    assert_relative_eq!(out[0], 0.24, epsilon = 1e-3);
}

#[test]
fn scenario_three_features_two_variants_all_identical() {
    let ctx = Context::try_default().unwrap();
    let variant = [0, 0, 1, 1];
    let mut parts = Vec::new();
    for _ in 0..6 {
        parts.extend_from_slice(&variant);
    }
    let out = compute_ari(&ctx, &parts, 3, 2, 4).unwrap();
    assert_eq!(out.len(), 12);
    for score in out {
        assert_relative_eq!(score, 1.0, epsilon = 1e-5);
    }
}

#[test]
fn scenario_degenerate_single_object() {
    let ctx = Context::try_default().unwrap();
    let parts = [0, 0];
    let out = compute_ari(&ctx, &parts, 2, 1, 1).unwrap();
    assert_eq!(out.len(), 1);
    assert_relative_eq!(out[0], 1.0, epsilon = 1e-5);
}

#[test]
fn property_ari_in_range() {
    let ctx = Context::try_default().unwrap();
    let parts = [0, 1, 2, 0, 1, 2, 0, 0, 1, 1, 2, 2, 2, 1, 0, 1, 2, 0];
    let out = compute_ari(&ctx, &parts, 3, 1, 6).unwrap();
    for score in out {
        assert!((-1.0 - 1e-4..=1.0 + 1e-4).contains(&score), "score {score} out of range");
    }
}

#[test]
fn property_relabeling_invariance() {
    let ctx = Context::try_default().unwrap();

    // part_a fixed; part_b appears twice, once as-is and once with labels
    // 0<->2 swapped. Both pairings against part_a must score identically.
    let part_a = [0, 0, 1, 1, 2, 2];
    let part_b = [0, 1, 0, 2, 1, 2];
    let part_b_relabeled = [2, 1, 2, 0, 1, 0];

    let mut parts = Vec::new();
    parts.extend_from_slice(&part_a); // feature 0, variant 0
    parts.extend_from_slice(&part_b); // feature 1, variant 0
    parts.extend_from_slice(&part_b_relabeled); // feature 2, variant 0

    // f=3, p=1, n=6 -> pairs (0,1), (0,2), (1,2).
    let out = compute_ari(&ctx, &parts, 3, 1, 6).unwrap();
    assert_eq!(out.len(), 3);
    assert_relative_eq!(out[0], out[1], epsilon = 1e-5);
}

#[test]
fn property_symmetric_under_feature_order() {
    let ctx = Context::try_default().unwrap();

    let part_a = [0, 0, 1, 1, 2, 2];
    let part_b = [0, 1, 0, 2, 1, 2];

    let mut forward = Vec::new();
    forward.extend_from_slice(&part_a);
    forward.extend_from_slice(&part_b);
    let forward_out = compute_ari(&ctx, &forward, 2, 1, 6).unwrap();

    let mut reversed = Vec::new();
    reversed.extend_from_slice(&part_b);
    reversed.extend_from_slice(&part_a);
    let reversed_out = compute_ari(&ctx, &reversed, 2, 1, 6).unwrap();

    assert_relative_eq!(forward_out[0], reversed_out[0], epsilon = 1e-5);
}

#[test]
fn tiled_variant_agrees_with_direct_variant_shape() {
    let ctx = Context::try_default().unwrap();
    let n = 3000usize;
    let mut a = Vec::with_capacity(n);
    let mut b = Vec::with_capacity(n);
    for t in 0..n {
        a.push((t % 5) as i32);
        b.push(((t + 1) % 5) as i32);
    }
    let mut parts = a;
    parts.extend_from_slice(&b);

    let out = compute_ari(&ctx, &parts, 2, 1, n).unwrap();
    assert_eq!(out.len(), 1);
    assert!((-1.0..=1.0 + 1e-4).contains(&out[0]));
}
