//! # Hash Family
//!
//! The four 64-bit perceptual hashes plus the SHA-256 content digest.
//!
//! ## Kernels
//! - **a_hash** - average hash over an 8x8 luminance plane
//! - **p_hash** - DCT-based perception hash over a 32x32 plane
//! - **d_hash** - horizontal gradient hash over a 9x8 plane
//! - **w_hash** - Haar wavelet hash over a power-of-two plane
//!
//! All kernels are deterministic: the same bytes always produce the same
//! hash, across runs and machines. Similarity between two hashes is
//! `1 - hamming / 64`. A zero hash value means "not computed" and must be
//! excluded from comparisons.

mod ahash;
mod dhash;
pub mod digest;
mod phash;
mod whash;

pub use digest::sha256_file;

use crate::core::preprocess::DecodedImage;
use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The perceptual hash kinds. Per-kind geometry (resample target, DCT
/// block) lives with the kind so callers dispatch through one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashKind {
    Average,
    Perception,
    Difference,
    Wavelet,
}

impl HashKind {
    /// All kinds in canonical order
    pub const ALL: [HashKind; 4] = [
        HashKind::Average,
        HashKind::Perception,
        HashKind::Difference,
        HashKind::Wavelet,
    ];

    /// Namespace key used by the fingerprint index
    pub fn key(&self) -> &'static str {
        match self {
            HashKind::Average => "a_hash",
            HashKind::Perception => "p_hash",
            HashKind::Difference => "d_hash",
            HashKind::Wavelet => "w_hash",
        }
    }

    /// Parse a namespace key or short name back into a kind
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "a" | "a_hash" | "ahash" => Some(HashKind::Average),
            "p" | "p_hash" | "phash" => Some(HashKind::Perception),
            "d" | "d_hash" | "dhash" => Some(HashKind::Difference),
            "w" | "w_hash" | "whash" => Some(HashKind::Wavelet),
            _ => None,
        }
    }
}

impl std::fmt::Display for HashKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Compute a perceptual hash of the given kind for a decoded image.
///
/// The DCT kernel requires at least 16x16 input; the others accept any
/// decodable image.
pub fn compute(kind: HashKind, image: &DecodedImage, path: &Path) -> Result<u64, DecodeError> {
    match kind {
        HashKind::Average => Ok(ahash::compute(image)),
        HashKind::Perception => phash::compute(image, path),
        HashKind::Difference => Ok(dhash::compute(image)),
        HashKind::Wavelet => Ok(whash::compute(image)),
    }
}

/// Hamming distance between two 64-bit hashes
#[inline]
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Similarity in [0, 1] from Hamming distance
#[inline]
pub fn similarity(a: u64, b: u64) -> f64 {
    1.0 - hamming(a, b) as f64 / 64.0
}

/// A 64-bit hash as its 16-char lowercase hex representation
pub fn to_hex(hash: u64) -> String {
    format!("{:016x}", hash)
}

/// Parse a 16-char hex hash back to its numeric value
pub fn from_hex(hex: &str) -> Option<u64> {
    u64::from_str_radix(hex, 16).ok()
}
