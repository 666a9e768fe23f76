#![forbid(unsafe_code)]

//! Property-based invariant tests for the flat distributor and segment tree.
//!
//! These tests verify constraints that must hold for any valid inputs:
//!
//! 1. Feasible targets are met exactly (within float tolerance).
//! 2. Every share lands inside its `[min, max]` clamps.
//! 3. Compression never grows a share above its base.
//! 4. Expansion never shrinks a share below its base.
//! 5. Entries with identical declarations receive identical treatment under
//!    permutation.
//! 6. Sibling distances tile the parent exactly after a tree solve.
//! 7. Placement offsets are exact prefix sums, rounded or not.
//! 8. Solving is idempotent.

use discadelta_layout::{
    DistributeEntry, Length, SegmentConfig, SegmentTree, distribute,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

/// Entries that can always absorb a target between their min and max sums:
/// fully compressible (no solidify floor) and positively expandable.
fn flexible_entries() -> impl Strategy<Value = Vec<DistributeEntry>> {
    prop::collection::vec(
        (1.0f32..400.0, 0.0f32..1.0, 0.0f32..400.0, 0.1f32..3.0).prop_map(
            |(base, min_frac, headroom, expand)| {
                let min = base * min_frac;
                DistributeEntry::new(base, min, base + headroom, 1.0, expand)
            },
        ),
        1..8,
    )
}

/// Entries with arbitrary (possibly zero) flexibility.
fn arbitrary_entries() -> impl Strategy<Value = Vec<DistributeEntry>> {
    prop::collection::vec(
        (
            0.0f32..400.0,
            0.0f32..200.0,
            0.0f32..600.0,
            0.0f32..1.5,
            0.0f32..3.0,
        )
            .prop_map(|(base, min, max_extra, flex_compress, flex_expand)| {
                DistributeEntry::new(base, min, min + max_extra, flex_compress, flex_expand)
            }),
        0..8,
    )
}

fn sum_distances(entries: &[DistributeEntry], target: f32) -> (Vec<f32>, f32) {
    let shares = distribute(target, entries);
    let distances: Vec<f32> = shares.iter().map(|s| s.distance).collect();
    let total = distances.iter().sum();
    (distances, total)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Feasible targets are met exactly
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn feasible_target_is_met(entries in flexible_entries(), frac in 0.0f32..1.0) {
        let min_sum: f32 = entries.iter().map(|e| e.min).sum();
        let max_sum: f32 = entries.iter().map(|e| e.max).sum();
        let target = min_sum + frac * (max_sum - min_sum);

        let (_, total) = sum_distances(&entries, target);
        let tolerance = 2e-3 * (1.0 + target);
        prop_assert!(
            (total - target).abs() <= tolerance,
            "target {} not met: allocated {}",
            target,
            total
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Every share respects its clamps
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn shares_stay_clamped(entries in arbitrary_entries(), target in 0.0f32..4000.0) {
        let (distances, _) = sum_distances(&entries, target);
        for (distance, entry) in distances.iter().zip(&entries) {
            prop_assert!(
                *distance >= entry.min - 1e-3,
                "share {} under min {}",
                distance,
                entry.min
            );
            prop_assert!(
                *distance <= entry.max + 1e-3,
                "share {} over max {}",
                distance,
                entry.max
            );
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Compression never grows a share
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn compression_never_grows(entries in arbitrary_entries(), frac in 0.0f32..1.0) {
        let base_sum: f32 = entries.iter().map(|e| e.base).sum();
        let target = base_sum * frac;
        prop_assume!(target < base_sum);

        let (distances, _) = sum_distances(&entries, target);
        for (distance, entry) in distances.iter().zip(&entries) {
            prop_assert!(
                *distance <= entry.base + 1e-3,
                "compression grew {} past base {}",
                distance,
                entry.base
            );
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Expansion never shrinks a share
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn expansion_never_shrinks(entries in arbitrary_entries(), extra in 0.0f32..2000.0) {
        let base_sum: f32 = entries.iter().map(|e| e.base).sum();
        let target = base_sum + extra;

        let (distances, _) = sum_distances(&entries, target);
        for (distance, entry) in distances.iter().zip(&entries) {
            prop_assert!(
                *distance >= entry.base - 1e-3,
                "expansion shrank {} below base {}",
                distance,
                entry.base
            );
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Identical entries are interchangeable
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn identical_entries_share_identically(
        base in 1.0f32..300.0,
        min_frac in 0.0f32..1.0,
        headroom in 0.0f32..300.0,
        count in 2usize..6,
        target in 0.0f32..2000.0,
    ) {
        let entry = DistributeEntry::new(
            base,
            base * min_frac,
            base + headroom,
            1.0,
            1.0,
        );
        let entries = vec![entry; count];
        let (distances, _) = sum_distances(&entries, target);
        for pair in distances.windows(2) {
            prop_assert!(
                (pair[0] - pair[1]).abs() <= 1e-3,
                "identical entries diverged: {:?}",
                distances
            );
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Sibling distances tile the parent after a tree solve
// ═════════════════════════════════════════════════════════════════════════

fn child_configs() -> impl Strategy<Value = Vec<(f32, f32, f32)>> {
    // (base, min fraction, headroom) per child; fully flexible like above.
    prop::collection::vec(
        (1.0f32..300.0, 0.0f32..1.0, 0.0f32..300.0),
        1..6,
    )
}

proptest! {
    #[test]
    fn siblings_tile_parent(children in child_configs(), frac in 0.0f32..1.0) {
        let mut tree = SegmentTree::new();
        let root = tree.create(SegmentConfig::named("root")).unwrap();
        let mut ids = Vec::new();
        let mut min_sum = 0.0f32;
        let mut max_sum = 0.0f32;
        for (i, &(base, min_frac, headroom)) in children.iter().enumerate() {
            let min = base * min_frac;
            let max = base + headroom;
            min_sum += min;
            max_sum += max;
            let id = tree
                .create(
                    SegmentConfig::named(format!("c{i}"))
                        .base(Length::Flat(base))
                        .bounds(min, max),
                )
                .unwrap();
            tree.link(id, root).unwrap();
            ids.push(id);
        }
        let target = min_sum + frac * (max_sum - min_sum);

        tree.solve(root, Length::Flat(target), 0.0, false).unwrap();
        let root_distance = tree.content(root).unwrap().distance;
        let total: f32 = ids
            .iter()
            .map(|&id| tree.content(id).unwrap().distance)
            .sum();
        prop_assert!(
            (total - root_distance).abs() <= 2e-3 * (1.0 + root_distance),
            "children sum {} != parent {}",
            total,
            root_distance
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Placement offsets are exact prefix sums
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn offsets_are_prefix_sums(
        children in child_configs(),
        origin in 0.0f32..100.0,
        round in prop::bool::ANY,
    ) {
        let mut tree = SegmentTree::new();
        let root = tree.create(SegmentConfig::named("root")).unwrap();
        let mut ids = Vec::new();
        for (i, &(base, _, _)) in children.iter().enumerate() {
            let id = tree
                .create(SegmentConfig::named(format!("c{i}")).base(Length::Flat(base)))
                .unwrap();
            tree.link(id, root).unwrap();
            ids.push(id);
        }
        let base_sum: f32 = children.iter().map(|&(base, _, _)| base).sum();

        tree.solve(root, Length::Flat(base_sum), origin, round).unwrap();
        for pair in ids.windows(2) {
            let previous = tree.content(pair[0]).unwrap();
            let next = tree.content(pair[1]).unwrap();
            prop_assert_eq!(
                next.offset,
                previous.offset + previous.distance,
                "offsets do not tile (round: {})",
                round
            );
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. Solving is idempotent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn solve_twice_matches(children in child_configs(), target in 0.0f32..1500.0) {
        let mut tree = SegmentTree::new();
        let root = tree.create(SegmentConfig::named("root")).unwrap();
        let mut ids = vec![root];
        for (i, &(base, min_frac, headroom)) in children.iter().enumerate() {
            let id = tree
                .create(
                    SegmentConfig::named(format!("c{i}"))
                        .base(Length::Flat(base))
                        .bounds(base * min_frac, base + headroom),
                )
                .unwrap();
            tree.link(id, root).unwrap();
            ids.push(id);
        }

        tree.solve(root, Length::Flat(target), 0.0, false).unwrap();
        let first: Vec<_> = ids
            .iter()
            .map(|&id| *tree.content(id).unwrap())
            .collect();
        tree.solve(root, Length::Flat(target), 0.0, false).unwrap();
        let second: Vec<_> = ids
            .iter()
            .map(|&id| *tree.content(id).unwrap())
            .collect();
        prop_assert_eq!(first, second);
    }
}
