//! Duplicate removal for the final result set.
//!
//! Both policies keep the last occurrence of each duplicate and preserve the
//! relative order of the groups that are kept.

use std::collections::HashSet;

use group_scout_config::DedupePolicy;
use group_scout_group_models::{Group, GroupId};

/// Removes every group that is structurally equal to a later group.
///
/// Equality covers every attribute, filter-derived ones included. `Group`
/// holds an `f64`, so this compares pairwise rather than hashing.
#[must_use]
pub fn de_dupe(groups: Vec<Group>) -> Vec<Group> {
    let len = groups.len();
    let keep: Vec<bool> = (0..len)
        .map(|i| !groups[i + 1..].iter().any(|later| *later == groups[i]))
        .collect();

    groups
        .into_iter()
        .zip(keep)
        .filter_map(|(group, keep)| keep.then_some(group))
        .collect()
}

/// Removes every group whose id occurs again later in the sequence.
#[must_use]
pub fn de_dupe_by_id(groups: Vec<Group>) -> Vec<Group> {
    let mut seen: HashSet<GroupId> = HashSet::with_capacity(groups.len());
    let mut kept: Vec<Group> = groups
        .into_iter()
        .rev()
        .filter(|group| seen.insert(group.id.clone()))
        .collect();
    kept.reverse();
    kept
}

/// Applies the configured dedup policy.
#[must_use]
pub fn de_dupe_with(policy: DedupePolicy, groups: Vec<Group>) -> Vec<Group> {
    match policy {
        DedupePolicy::Structural => de_dupe(groups),
        DedupePolicy::Id => de_dupe_by_id(groups),
    }
}
