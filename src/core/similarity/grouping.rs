//! Exact and near-duplicate grouping.
//!
//! Exact groups partition fingerprints by content digest. Near groups
//! come from a greedy single pass in index order: each unassigned
//! fingerprint seeds a group and claims every later unassigned
//! fingerprint whose weighted similarity meets the threshold. Groups
//! returned by one query are pairwise disjoint by construction.

use super::{Comparator, LshIndex};
use crate::core::hasher::HashKind;
use crate::core::types::{DuplicateGroup, DuplicateReason, Fingerprint, SelectionPolicy};
use crate::error::CompareError;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Above this many fingerprints the quadratic scan switches to LSH
/// candidate pruning
const LSH_CUTOFF: usize = 100_000;

/// Score a fingerprint under a selection policy; higher wins
fn policy_score(fingerprint: &Fingerprint, policy: SelectionPolicy) -> f64 {
    match policy {
        SelectionPolicy::HighestQuality => fingerprint.quality.final_score,
        SelectionPolicy::HighestResolution => {
            (fingerprint.metadata.width as f64) * (fingerprint.metadata.height as f64)
        }
        SelectionPolicy::BestExposure => {
            1.0 - 2.0 * (fingerprint.quality.exposure - 0.5).abs()
        }
        SelectionPolicy::Oldest => -(fingerprint.metadata.modified_at.timestamp() as f64),
        SelectionPolicy::Newest => fingerprint.metadata.modified_at.timestamp() as f64,
    }
}

/// Pick the main image of a group. Ties break toward the
/// lexicographically smaller path.
pub fn select_main<'a>(
    members: &[&'a Fingerprint],
    policy: SelectionPolicy,
) -> &'a Fingerprint {
    let mut best = members[0];
    let mut best_score = policy_score(best, policy);

    for &candidate in &members[1..] {
        let score = policy_score(candidate, policy);
        if score > best_score
            || (score == best_score && candidate.metadata.path < best.metadata.path)
        {
            best = candidate;
            best_score = score;
        }
    }
    best
}

fn build_group(
    members: Vec<&Fingerprint>,
    group_id: String,
    reason: DuplicateReason,
    confidence: f64,
    policy: SelectionPolicy,
) -> DuplicateGroup {
    let main = select_main(&members, policy);
    let mut duplicate_ids: Vec<_> = members
        .iter()
        .filter(|fp| fp.id != main.id)
        .map(|fp| fp.id.clone())
        .collect();
    duplicate_ids.sort();

    DuplicateGroup {
        group_id,
        main_image_id: main.id.clone(),
        duplicate_ids,
        reason,
        confidence,
    }
}

/// Group byte-identical images by content digest. Confidence is always
/// 1.0; every pair inside a group shares its sha256.
pub fn find_exact_groups(
    fingerprints: &[Fingerprint],
    policy: SelectionPolicy,
) -> Vec<DuplicateGroup> {
    let mut by_digest: BTreeMap<&str, Vec<&Fingerprint>> = BTreeMap::new();
    for fp in fingerprints {
        by_digest.entry(&fp.metadata.sha256).or_default().push(fp);
    }

    let mut classes: Vec<Vec<&Fingerprint>> = by_digest
        .into_values()
        .filter(|members| members.len() >= 2)
        .collect();

    // Deterministic group numbering: order classes by smallest path
    for members in classes.iter_mut() {
        members.sort_by(|a, b| a.metadata.path.cmp(&b.metadata.path));
    }
    classes.sort_by(|a, b| a[0].metadata.path.cmp(&b[0].metadata.path));

    classes
        .into_iter()
        .enumerate()
        .map(|(n, members)| {
            build_group(members, format!("exact_{n}"), DuplicateReason::Exact, 1.0, policy)
        })
        .collect()
}

/// Greedy near-duplicate clustering at the given similarity threshold.
///
/// Confidence of a group is the mean of all pairwise similarities among
/// its final members. O(n^2) in fingerprint count; above `LSH_CUTOFF`
/// the inner loop is restricted to LSH candidates.
pub fn find_near_groups(
    fingerprints: &[Fingerprint],
    threshold: f64,
    comparator: &Comparator,
    policy: SelectionPolicy,
) -> Result<Vec<DuplicateGroup>, CompareError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(CompareError::InvalidThreshold { value: threshold });
    }

    // Index order: stable and deterministic
    let mut ordered: Vec<&Fingerprint> = fingerprints.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));
    let n = ordered.len();

    let lsh = (n > LSH_CUTOFF).then(|| build_lsh(&ordered));

    let mut assigned = vec![false; n];
    let mut groups = Vec::new();

    for i in 0..n {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let seed = ordered[i];

        let candidates: Vec<usize> = match &lsh {
            Some(tables) => {
                let mut set = candidate_positions(tables, seed);
                set.retain(|&j| j > i && !assigned[j]);
                set.sort_unstable();
                set
            }
            None => ((i + 1)..n).filter(|&j| !assigned[j]).collect(),
        };

        let matched: Vec<usize> = candidates
            .par_iter()
            .copied()
            .filter(|&j| comparator.similarity(seed, ordered[j]) >= threshold)
            .collect();

        if matched.is_empty() {
            continue;
        }

        let mut members = vec![seed];
        for j in matched {
            assigned[j] = true;
            members.push(ordered[j]);
        }

        let confidence = mean_pairwise_similarity(&members, comparator);
        groups.push(build_group(
            members,
            format!("near_{}", groups.len()),
            DuplicateReason::Near,
            confidence,
            policy,
        ));
    }

    Ok(groups)
}

fn build_lsh(ordered: &[&Fingerprint]) -> Vec<(HashKind, LshIndex)> {
    HashKind::ALL
        .iter()
        .map(|&kind| {
            let mut index = LshIndex::with_default_bands();
            for (position, fp) in ordered.iter().enumerate() {
                if let Some(hash) = fp.perceptual_hashes.get(kind) {
                    index.add(position, hash);
                }
            }
            (kind, index)
        })
        .collect()
}

fn candidate_positions(tables: &[(HashKind, LshIndex)], seed: &Fingerprint) -> Vec<usize> {
    let mut set = std::collections::HashSet::new();
    for (kind, index) in tables {
        if let Some(hash) = seed.perceptual_hashes.get(*kind) {
            set.extend(index.candidates(hash));
        }
    }
    set.into_iter().collect()
}

/// Mean similarity over every unordered pair of members
pub fn mean_pairwise_similarity(members: &[&Fingerprint], comparator: &Comparator) -> f64 {
    if members.len() < 2 {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut pairs = 0u64;
    for i in 0..members.len() {
        for j in (i + 1)..members.len() {
            sum += comparator.similarity(members[i], members[j]);
            pairs += 1;
        }
    }
    sum / pairs as f64
}
