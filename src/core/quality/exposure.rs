//! Exposure and contrast over the full luminance histogram.

use crate::core::preprocess::LumaBuffer;

const DARK_CUTOFF: f64 = 0.1;
const BRIGHT_CUTOFF: f64 = 0.9;
const TAIL_RATIO: f64 = 0.3;
const TAIL_PENALTY: f64 = 0.5;
const CONTRAST_NORMALIZER: f64 = 0.4;

/// Exposure in [0, 1]; 0.5 is ideal. Mean luminance with penalties when
/// more than 30% of pixels crush into either tail.
pub fn analyze_exposure(luma: &LumaBuffer) -> f64 {
    let total = luma.pixels().len();
    if total == 0 {
        return 0.5;
    }

    let mut sum = 0.0;
    let mut dark = 0usize;
    let mut bright = 0usize;

    for &pixel in luma.pixels() {
        let value = pixel as f64 / 255.0;
        sum += value;
        if value < DARK_CUTOFF {
            dark += 1;
        } else if value > BRIGHT_CUTOFF {
            bright += 1;
        }
    }

    let mut exposure = sum / total as f64;
    let dark_ratio = dark as f64 / total as f64;
    let bright_ratio = bright as f64 / total as f64;

    if dark_ratio > TAIL_RATIO {
        exposure -= (dark_ratio - TAIL_RATIO) * TAIL_PENALTY;
    }
    if bright_ratio > TAIL_RATIO {
        exposure += (bright_ratio - TAIL_RATIO) * TAIL_PENALTY;
    }

    exposure.clamp(0.0, 1.0)
}

/// Contrast in [0, 1]: luminance standard deviation over 0.4
pub fn analyze_contrast(luma: &LumaBuffer) -> f64 {
    let total = luma.pixels().len();
    if total == 0 {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut sum_squares = 0.0;
    for &pixel in luma.pixels() {
        let value = pixel as f64 / 255.0;
        sum += value;
        sum_squares += value * value;
    }

    let mean = sum / total as f64;
    let variance = (sum_squares / total as f64 - mean * mean).max(0.0);

    (variance.sqrt() / CONTRAST_NORMALIZER).min(1.0)
}
