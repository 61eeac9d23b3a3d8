//! Greedy content clustering.
//!
//! Unlike duplicate grouping, clustering partitions the whole
//! collection: every fingerprint lands in exactly one cluster, and
//! singletons are kept. Useful for browsing a library by visual theme at
//! a looser threshold than duplicate detection.

use super::Comparator;
use crate::core::types::{Cluster, Fingerprint};
use crate::error::CompareError;

/// Partition fingerprints into similarity clusters at `threshold`
pub fn cluster_by_content(
    fingerprints: &[Fingerprint],
    threshold: f64,
    comparator: &Comparator,
) -> Result<Vec<Cluster>, CompareError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(CompareError::InvalidThreshold { value: threshold });
    }

    let mut ordered: Vec<&Fingerprint> = fingerprints.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let mut assigned = vec![false; ordered.len()];
    let mut clusters = Vec::new();

    for i in 0..ordered.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;

        let mut images = vec![ordered[i].id.clone()];
        for j in (i + 1)..ordered.len() {
            if assigned[j] {
                continue;
            }
            if comparator.similarity(ordered[i], ordered[j]) >= threshold {
                images.push(ordered[j].id.clone());
                assigned[j] = true;
            }
        }

        clusters.push(Cluster {
            cluster_id: format!("cluster_{}", clusters.len()),
            name: None,
            images,
            centroid: None,
        });
    }

    Ok(clusters)
}
