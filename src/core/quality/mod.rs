//! # Quality Analyzer
//!
//! Rates images on six metrics - sharpness, noise, exposure, contrast,
//! compression artifacts, and color cast - and combines them into a
//! composite 0-100 score used to pick the best image of a duplicate
//! group.
//!
//! A failing or inapplicable sub-analyzer never fails the whole
//! analysis: it substitutes its documented default (0.5 for exposure and
//! noise with nothing to measure, 0 for sharpness/contrast on undersized
//! images, 0.1 for compression on tiny images, 0 for color cast on black
//! frames) and the composite is computed from whatever was measured.

mod color_cast;
mod compression;
mod exposure;
mod noise;
mod score;
mod sharpness;

pub use score::{
    all_metrics_defaulted, composite, exposure_centered, QualityWeights, ALL_DEFAULTED_SCORE,
};

use crate::core::preprocess::DecodedImage;
use crate::core::types::{ImageQuality, QualityLevel};
use serde::{Deserialize, Serialize};

/// Thresholds for the convenience predicates
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub sharpness_threshold: f64,
    pub min_exposure: f64,
    pub max_exposure: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sharpness_threshold: 0.1,
            min_exposure: 0.1,
            max_exposure: 0.9,
        }
    }
}

/// Computes the quality vector for decoded images
#[derive(Debug, Clone, Default)]
pub struct QualityAnalyzer {
    config: AnalyzerConfig,
    weights: QualityWeights,
}

impl QualityAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            weights: QualityWeights::default(),
        }
    }

    /// Override the composite weights; they are renormalized to sum to 1
    pub fn set_weights(&mut self, weights: QualityWeights) {
        self.weights = weights.normalized();
    }

    pub fn weights(&self) -> &QualityWeights {
        &self.weights
    }

    /// Analyze a decoded image. Infallible by design: sub-analyzers
    /// substitute defaults instead of propagating errors.
    pub fn analyze(&self, image: &DecodedImage) -> ImageQuality {
        let luma = image.luminance();
        let rgb = image.rgb();

        if luma.width() < 3 || luma.height() < 3 {
            tracing::debug!(
                width = luma.width(),
                height = luma.height(),
                "image below kernel minimum, quality uses defaults"
            );
        }

        let mut quality = ImageQuality {
            sharpness: sharpness::analyze(&luma),
            noise: noise::analyze(&luma),
            exposure: exposure::analyze_exposure(&luma),
            contrast: exposure::analyze_contrast(&luma),
            compression: compression::analyze(&luma),
            color_cast: color_cast::analyze(&rgb),
            final_score: 0.0,
        };
        quality.final_score = if all_metrics_defaulted(&quality) {
            tracing::debug!("every quality kernel fell back to its default, scoring 50");
            ALL_DEFAULTED_SCORE
        } else {
            composite(&quality, &self.weights)
        };

        tracing::debug!(
            sharpness = quality.sharpness,
            noise = quality.noise,
            final_score = quality.final_score,
            "quality analysis complete"
        );

        quality
    }

    /// Tier label for reporting
    pub fn level(&self, quality: &ImageQuality) -> QualityLevel {
        QualityLevel::from_score(quality.final_score)
    }

    pub fn is_blurry(&self, quality: &ImageQuality) -> bool {
        quality.sharpness < self.config.sharpness_threshold
    }

    pub fn is_underexposed(&self, quality: &ImageQuality) -> bool {
        quality.exposure < self.config.min_exposure
    }

    pub fn is_overexposed(&self, quality: &ImageQuality) -> bool {
        quality.exposure > self.config.max_exposure
    }
}
