#![forbid(unsafe_code)]

//! Flat proportional distributor with iterative clamp satisfaction.
//!
//! Given a target length and an ordered list of entries, the distributor
//! returns one length per entry so that the lengths sum to the target as
//! closely as clamp feasibility permits.
//!
//! # Algorithm
//!
//! The mode is picked once: if the target is below the summed bases the
//! deficit is **compressed** out of the entries, otherwise the surplus is
//! **expanded** into them. Both modes run the same fixed-point shape:
//!
//! 1. Sweep the currently flexible entries in declared order, proposing a
//!    proportional share for each from the running budgets.
//! 2. Clamp each proposal (against `min` when compressing, `max` when
//!    expanding). An entry whose proposal was clamped, or that carries no
//!    flexibility at all, becomes **fixed**: its length is final and is
//!    subtracted from the next pass's budget.
//! 3. Repeat over the surviving flexible entries until a pass fixes nothing.
//!
//! Termination is guaranteed: every repeated pass strictly shrinks the
//! flexible set. Typical inputs converge in one or two passes.
//!
//! When no entry is flexible the request cannot be honored and the leftover
//! budget is silently dropped; callers observe the residual by summing the
//! results.

use discadelta_core::{debug, trace};
use discadelta_core::geometry::clamp_length;

/// One entry's declared contribution to a flat distribution.
///
/// Entries are normalized on construction; the solver itself never sees an
/// individually infeasible entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributeEntry {
    /// Effective base length, already forced into `[min, max]`.
    pub base: f32,
    /// Hard lower clamp.
    pub min: f32,
    /// Hard upper clamp; may be infinite.
    pub max: f32,
    /// Portion of `base` that compression may remove (`base * flex_compress`).
    pub compress_capacity: f32,
    /// Portion of `base` that resists compression.
    pub compress_solidify: f32,
    /// Weight for sharing expansion surplus.
    pub expand_ratio: f32,
}

impl DistributeEntry {
    /// Normalize a raw declaration into a distribution entry.
    ///
    /// Negative inputs are clamped to zero, `max` is raised to at least
    /// `min`, and `base` is forced into `[min, max]`.
    pub fn new(base: f32, min: f32, max: f32, flex_compress: f32, flex_expand: f32) -> Self {
        let min = min.max(0.0);
        let max = max.max(min);
        let base = clamp_length(base, min, max);
        let compress_capacity = base * flex_compress.max(0.0);
        let compress_solidify = (base - compress_capacity).max(0.0);
        Self {
            base,
            min,
            max,
            compress_capacity,
            compress_solidify,
            expand_ratio: flex_expand.max(0.0),
        }
    }
}

/// Solved share for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Distributed {
    /// Base after the compression pass (equals the declared base otherwise).
    pub base: f32,
    /// Signed contribution of the expansion pass (zero under compression).
    pub expand_delta: f32,
    /// Final length: `base + expand_delta`.
    pub distance: f32,
}

/// Distribute `target` across `entries`, returning one share per entry.
pub fn distribute(target: f32, entries: &[DistributeEntry]) -> Vec<Distributed> {
    let target = target.max(0.0);
    let mut shares: Vec<Distributed> = entries
        .iter()
        .map(|entry| Distributed {
            base: entry.base,
            expand_delta: 0.0,
            distance: entry.base,
        })
        .collect();
    if entries.is_empty() {
        return shares;
    }

    let accumulate_base: f32 = entries.iter().map(|entry| entry.base).sum();
    if target < accumulate_base {
        compress(target, entries, &mut shares);
    } else {
        expand(target - accumulate_base, entries, &mut shares);
    }

    let allocated: f32 = shares.iter().map(|share| share.distance).sum();
    let residual = target - allocated;
    if residual.abs() > f32::EPSILON * entries.len() as f32 * target.max(1.0) {
        debug!(target, residual, "distribution left an unallocated residual");
    }
    shares
}

/// Shrink flexible entries until the target is met or every entry is pinned.
fn compress(target: f32, entries: &[DistributeEntry], shares: &mut [Distributed]) {
    let mut flexible: Vec<usize> = (0..entries.len()).collect();
    let mut pass_target = target;
    let mut passes = 0u32;

    loop {
        passes += 1;
        let mut remain_dist = pass_target;
        let mut remain_capacity: f32 = flexible.iter().map(|&i| entries[i].base).sum();
        let mut remain_solidify: f32 =
            flexible.iter().map(|&i| entries[i].compress_solidify).sum();
        let mut next_target = pass_target;
        let mut survivors = Vec::with_capacity(flexible.len());

        for &i in &flexible {
            let entry = &entries[i];
            let free_dist = remain_dist - remain_solidify;
            let free_capacity = remain_capacity - remain_solidify;
            let proposed =
                if free_dist <= 0.0 || free_capacity <= 0.0 || entry.compress_capacity <= 0.0 {
                    entry.compress_solidify
                } else {
                    free_dist / free_capacity * entry.compress_capacity + entry.compress_solidify
                };
            let settled = proposed.max(entry.min);

            shares[i].base = settled;
            shares[i].distance = settled;

            if settled != proposed || entry.compress_capacity <= 0.0 {
                // Pinned: later passes solve the remaining budget without it.
                next_target -= settled;
            } else {
                survivors.push(i);
            }

            remain_dist -= settled;
            remain_solidify -= entry.compress_solidify;
            remain_capacity -= entry.base;
        }

        if survivors.len() == flexible.len() || survivors.is_empty() {
            trace!(passes, "compression converged");
            return;
        }
        flexible = survivors;
        pass_target = next_target;
    }
}

/// Grow flexible entries by `surplus`, weighted by their expand ratios.
fn expand(surplus: f32, entries: &[DistributeEntry], shares: &mut [Distributed]) {
    let mut flexible: Vec<usize> = (0..entries.len()).collect();
    let mut pass_surplus = surplus;
    let mut passes = 0u32;

    while pass_surplus > 0.0 {
        passes += 1;
        let mut remain_surplus = pass_surplus;
        let mut remain_ratio: f32 = flexible.iter().map(|&i| entries[i].expand_ratio).sum();
        let mut next_surplus = pass_surplus;
        let mut survivors = Vec::with_capacity(flexible.len());

        for &i in &flexible {
            let entry = &entries[i];
            let delta = if remain_ratio <= 0.0 || entry.expand_ratio <= 0.0 {
                0.0
            } else {
                remain_surplus / remain_ratio * entry.expand_ratio
            };
            let max_delta = (entry.max - entry.base).max(0.0);
            let settled = delta.min(max_delta);

            shares[i].expand_delta = settled;
            shares[i].distance = entry.base + settled;

            if settled != delta || entry.expand_ratio <= 0.0 {
                next_surplus -= settled;
            } else {
                survivors.push(i);
            }

            remain_surplus -= settled;
            remain_ratio -= entry.expand_ratio;
        }

        if survivors.len() == flexible.len() || survivors.is_empty() {
            break;
        }
        flexible = survivors;
        pass_surplus = next_surplus;
    }
    trace!(passes, "expansion converged");
}
