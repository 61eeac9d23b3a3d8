//! # Similarity & Grouping
//!
//! Weighted multi-hash comparison between fingerprints, exact and
//! near-duplicate grouping, greedy content clustering, and the LSH
//! candidate index that keeps large near-duplicate runs tractable.

mod clustering;
mod grouping;
mod lsh;

pub use clustering::cluster_by_content;
pub use grouping::{find_exact_groups, find_near_groups, select_main};
pub use lsh::LshIndex;

use crate::core::hasher::{self, HashKind};
use crate::core::types::Fingerprint;
use serde::{Deserialize, Serialize};

/// Per-kind weights for the combined similarity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HashWeights {
    pub a: f64,
    pub p: f64,
    pub d: f64,
    pub w: f64,
}

impl Default for HashWeights {
    fn default() -> Self {
        Self {
            a: 0.2,
            p: 0.4,
            d: 0.3,
            w: 0.1,
        }
    }
}

impl HashWeights {
    fn for_kind(&self, kind: HashKind) -> f64 {
        match kind {
            HashKind::Average => self.a,
            HashKind::Perception => self.p,
            HashKind::Difference => self.d,
            HashKind::Wavelet => self.w,
        }
    }
}

/// Optional monotone transform applied to per-kind similarities before
/// weighting. A tuning knob, not part of the similarity contract; tests
/// use `Identity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    #[default]
    Identity,
    /// Mildly penalize mid-range p_hash matches and boost strong w_hash
    /// matches
    Tuned,
}

impl Bias {
    fn apply(&self, kind: HashKind, similarity: f64) -> f64 {
        match self {
            Bias::Identity => similarity,
            Bias::Tuned => match kind {
                HashKind::Perception => {
                    if similarity > 0.9 {
                        similarity
                    } else if similarity > 0.7 {
                        similarity * 0.9
                    } else {
                        similarity * 0.8
                    }
                }
                HashKind::Wavelet => {
                    if similarity > 0.6 {
                        (similarity * 1.1).min(1.0)
                    } else {
                        similarity
                    }
                }
                _ => similarity,
            },
        }
    }
}

/// Compares fingerprints through their perceptual hashes
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    weights: HashWeights,
    bias: Bias,
}

impl Comparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, weights: HashWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_bias(mut self, bias: Bias) -> Self {
        self.bias = bias;
        self
    }

    /// Weighted similarity in [0, 1] over the hash kinds that are
    /// non-zero on both sides. 0 when no kind participates.
    pub fn similarity(&self, first: &Fingerprint, second: &Fingerprint) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for kind in HashKind::ALL {
            let weight = self.weights.for_kind(kind);
            if weight <= 0.0 {
                continue;
            }
            let (Some(h1), Some(h2)) = (
                first.perceptual_hashes.get(kind),
                second.perceptual_hashes.get(kind),
            ) else {
                continue;
            };

            let s = self.bias.apply(kind, hasher::similarity(h1, h2));
            weighted_sum += s * weight;
            weight_total += weight;
        }

        if weight_total == 0.0 {
            return 0.0;
        }
        (weighted_sum / weight_total).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::types::{
        ImageId, ImageMetadata, ImageQuality, PerceptualHashes,
    };
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    /// Deterministic fingerprint factory shared by the similarity tests
    pub(crate) fn fingerprint(
        name: &str,
        sha: char,
        hashes: PerceptualHashes,
        quality: f64,
    ) -> Fingerprint {
        let created_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        Fingerprint {
            id: ImageId(format!("img_{name}")),
            metadata: ImageMetadata {
                path: PathBuf::from(format!("/photos/{name}.png")),
                size_bytes: 1000,
                format: "png".to_string(),
                width: 640,
                height: 480,
                modified_at: created_at,
                sha256: sha.to_string().repeat(64),
                exif: None,
            },
            perceptual_hashes: hashes,
            quality: ImageQuality {
                exposure: 0.5,
                final_score: quality,
                ..Default::default()
            },
            created_at,
            color_histogram: None,
            feature_vector: None,
        }
    }

    pub(crate) fn with_all_hashes(seed: u64) -> PerceptualHashes {
        PerceptualHashes {
            a_hash: seed,
            p_hash: seed.rotate_left(8),
            d_hash: seed.rotate_left(16),
            w_hash: seed.rotate_left(24),
        }
    }

    #[test]
    fn identity_similarity_is_one() {
        let comparator = Comparator::new();
        let fp = fingerprint("a", 'a', with_all_hashes(0xABCD), 50.0);
        assert_eq!(comparator.similarity(&fp, &fp), 1.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let comparator = Comparator::new();
        let a = fingerprint("a", 'a', with_all_hashes(0xABCD), 50.0);
        let b = fingerprint("b", 'b', with_all_hashes(0x1234), 50.0);
        assert_eq!(comparator.similarity(&a, &b), comparator.similarity(&b, &a));
    }

    #[test]
    fn similarity_stays_in_bounds() {
        let comparator = Comparator::new();
        let a = fingerprint("a", 'a', with_all_hashes(u64::MAX), 50.0);
        let b = fingerprint("b", 'b', with_all_hashes(0), 50.0);
        let s = comparator.similarity(&a, &b);
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn zero_hashes_do_not_participate() {
        let comparator = Comparator::new();
        // Only a_hash on both sides: the other kinds carry no weight
        let a = fingerprint(
            "a",
            'a',
            PerceptualHashes {
                a_hash: 0xFF,
                ..Default::default()
            },
            50.0,
        );
        let b = fingerprint(
            "b",
            'b',
            PerceptualHashes {
                a_hash: 0xFF,
                p_hash: 0x1234,
                ..Default::default()
            },
            50.0,
        );
        assert_eq!(comparator.similarity(&a, &b), 1.0);
    }

    #[test]
    fn no_common_kind_means_zero() {
        let comparator = Comparator::new();
        let a = fingerprint(
            "a",
            'a',
            PerceptualHashes {
                a_hash: 0xFF,
                ..Default::default()
            },
            50.0,
        );
        let b = fingerprint(
            "b",
            'b',
            PerceptualHashes {
                p_hash: 0xFF,
                ..Default::default()
            },
            50.0,
        );
        assert_eq!(comparator.similarity(&a, &b), 0.0);
    }

    #[test]
    fn tuned_bias_penalizes_midrange_phash() {
        let identity = Comparator::new();
        let tuned = Comparator::new().with_bias(Bias::Tuned);

        // p_hash only, 16 differing bits: raw similarity 0.75
        let a = fingerprint(
            "a",
            'a',
            PerceptualHashes {
                p_hash: u64::MAX,
                ..Default::default()
            },
            50.0,
        );
        let b = fingerprint(
            "b",
            'b',
            PerceptualHashes {
                p_hash: u64::MAX >> 16,
                ..Default::default()
            },
            50.0,
        );

        let raw = identity.similarity(&a, &b);
        assert!((raw - 0.75).abs() < 1e-9);
        assert!((tuned.similarity(&a, &b) - 0.675).abs() < 1e-9);
    }
}
