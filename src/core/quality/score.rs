//! Composite quality scoring.
//!
//! The six metrics combine into a 0-100 score. Noise, compression and
//! color cast are inverted (lower raw value is better); exposure is
//! folded around its 0.5 ideal before weighting.

use crate::core::types::ImageQuality;
use serde::{Deserialize, Serialize};

/// Metric weights. Overrides are renormalized so the weights always sum
/// to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub sharpness: f64,
    pub noise: f64,
    pub exposure: f64,
    pub contrast: f64,
    pub compression: f64,
    pub color_cast: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            sharpness: 0.30,
            noise: 0.25,
            exposure: 0.20,
            contrast: 0.15,
            compression: 0.05,
            color_cast: 0.05,
        }
    }
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.sharpness + self.noise + self.exposure + self.contrast + self.compression
            + self.color_cast
    }

    /// Scale the weights so they sum to 1. A zero-sum set is left alone.
    pub fn normalize(&mut self) {
        let total = self.sum();
        if total == 0.0 {
            return;
        }
        self.sharpness /= total;
        self.noise /= total;
        self.exposure /= total;
        self.contrast /= total;
        self.compression /= total;
        self.color_cast /= total;
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

/// Distance of exposure from its 0.5 ideal, folded into [0, 1]
pub fn exposure_centered(exposure: f64) -> f64 {
    1.0 - 2.0 * (exposure - 0.5).abs()
}

/// True when every metric sits exactly at its documented fallback value
/// (sharpness 0, noise 0.5, exposure 0.5, contrast 0, compression 0.1,
/// color cast 0), meaning no kernel measured anything. The composite is
/// meaningless in that state and the score falls back to 50.
pub fn all_metrics_defaulted(quality: &ImageQuality) -> bool {
    quality.sharpness == 0.0
        && quality.noise == 0.5
        && quality.exposure == 0.5
        && quality.contrast == 0.0
        && quality.compression == 0.1
        && quality.color_cast == 0.0
}

/// Score substituted when every sub-analyzer failed
pub const ALL_DEFAULTED_SCORE: f64 = 50.0;

/// The weighted composite, clamped to [0, 100]
pub fn composite(quality: &ImageQuality, weights: &QualityWeights) -> f64 {
    let score = quality.sharpness * weights.sharpness
        + (1.0 - quality.noise) * weights.noise
        + exposure_centered(quality.exposure) * weights.exposure
        + quality.contrast * weights.contrast
        + (1.0 - quality.compression) * weights.compression
        + (1.0 - quality.color_cast) * weights.color_cast;

    (score * 100.0).clamp(0.0, 100.0)
}
