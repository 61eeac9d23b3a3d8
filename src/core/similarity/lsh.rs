//! Banded LSH index over 64-bit perceptual hashes.
//!
//! Splits each hash into fixed bit bands; items sharing any band value
//! are candidates. Used to restrict the near-duplicate inner loop on
//! large indices; with the default four 16-bit bands every pair within
//! Hamming distance 3 is guaranteed to collide in at least one band
//! (pigeonhole), and pairs up to much larger distances usually do.

use std::collections::{HashMap, HashSet};

const DEFAULT_BANDS: usize = 4;

/// LSH index over item positions. Items are addressed by the caller's
/// index into its own fingerprint list.
pub struct LshIndex {
    bands: usize,
    bits_per_band: u32,
    /// band -> band value -> item positions
    tables: Vec<HashMap<u64, Vec<usize>>>,
}

impl LshIndex {
    pub fn new(bands: usize) -> Self {
        let bands = bands.clamp(1, 64);
        Self {
            bands,
            bits_per_band: (64 / bands) as u32,
            tables: (0..bands).map(|_| HashMap::new()).collect(),
        }
    }

    pub fn with_default_bands() -> Self {
        Self::new(DEFAULT_BANDS)
    }

    fn band_value(&self, hash: u64, band: usize) -> u64 {
        let shift = band as u32 * self.bits_per_band;
        let mask = if self.bits_per_band >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits_per_band) - 1
        };
        (hash >> shift) & mask
    }

    /// Register an item's hash under every band
    pub fn add(&mut self, position: usize, hash: u64) {
        for band in 0..self.bands {
            let value = self.band_value(hash, band);
            self.tables[band].entry(value).or_default().push(position);
        }
    }

    /// Positions sharing at least one band value with `hash`
    pub fn candidates(&self, hash: u64) -> HashSet<usize> {
        let mut out = HashSet::new();
        for band in 0..self.bands {
            let value = self.band_value(hash, band);
            if let Some(bucket) = self.tables[band].get(&value) {
                out.extend(bucket.iter().copied());
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(|t| t.is_empty())
    }
}
