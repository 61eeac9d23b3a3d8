//! Sharpness via the discrete Laplacian.
//!
//! `4c - (n + s + e + w)` at every interior pixel; the mean absolute
//! response, divided by an empirical normalizer of 100, measures edge
//! energy. Blurry images score near zero.

use crate::core::preprocess::LumaBuffer;

const NORMALIZER: f64 = 100.0;

/// Sharpness in [0, 1]; undersized images (below 3x3) score 0
pub fn analyze(luma: &LumaBuffer) -> f64 {
    let (width, height) = (luma.width(), luma.height());
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut count = 0u64;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = luma.get(x, y) as f64;
            let north = luma.get(x, y - 1) as f64;
            let south = luma.get(x, y + 1) as f64;
            let west = luma.get(x - 1, y) as f64;
            let east = luma.get(x + 1, y) as f64;

            sum += (4.0 * center - (north + south + east + west)).abs();
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }

    (sum / count as f64 / NORMALIZER).min(1.0)
}
