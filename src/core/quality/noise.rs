//! Noise estimation over locally flat regions.
//!
//! For every interior pixel, the mean and variance of its eight
//! neighbors are computed. Pixels whose center deviates less than the
//! flatness threshold from the neighbor mean lie in flat regions, where
//! any residual variance is noise rather than texture.

use crate::core::preprocess::LumaBuffer;

/// A pixel is "flat" when |center - neighbor mean| is below this
const FLAT_THRESHOLD: f64 = 10.0;
const NORMALIZER: f64 = 50.0;

/// Noise in [0, 1]; 0.5 when no flat regions exist to measure
pub fn analyze(luma: &LumaBuffer) -> f64 {
    let (width, height) = (luma.width(), luma.height());
    if width < 3 || height < 3 {
        return 0.5;
    }

    let mut noise_sum = 0.0;
    let mut count = 0u64;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = luma.get(x, y) as f64;

            let neighbors = [
                luma.get(x - 1, y - 1),
                luma.get(x, y - 1),
                luma.get(x + 1, y - 1),
                luma.get(x - 1, y),
                luma.get(x + 1, y),
                luma.get(x - 1, y + 1),
                luma.get(x, y + 1),
                luma.get(x + 1, y + 1),
            ];

            let mean = neighbors.iter().map(|&n| n as f64).sum::<f64>() / 8.0;
            let variance = neighbors
                .iter()
                .map(|&n| {
                    let d = n as f64 - mean;
                    d * d
                })
                .sum::<f64>()
                / 8.0;

            if (center - mean).abs() < FLAT_THRESHOLD {
                noise_sum += variance.sqrt();
                count += 1;
            }
        }
    }

    if count == 0 {
        return 0.5;
    }

    (noise_sum / count as f64 / NORMALIZER).min(1.0)
}
