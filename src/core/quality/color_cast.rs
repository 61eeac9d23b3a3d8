//! Color cast detection.
//!
//! Samples the RGB plane on a 4x4 stride, normalizes the per-channel
//! means by the strongest channel, and measures the Euclidean distance
//! to neutral white (1, 1, 1) divided by sqrt(3).

use image::RgbImage;

const STRIDE: u32 = 4;

/// Cast strength in [0, 1]; a fully black image scores 0
pub fn analyze(rgb: &RgbImage) -> f64 {
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let mut r_sum = 0.0;
    let mut g_sum = 0.0;
    let mut b_sum = 0.0;
    let mut samples = 0u64;

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let pixel = rgb.get_pixel(x, y).0;
            r_sum += pixel[0] as f64 / 255.0;
            g_sum += pixel[1] as f64 / 255.0;
            b_sum += pixel[2] as f64 / 255.0;
            samples += 1;
            x += STRIDE;
        }
        y += STRIDE;
    }

    let n = samples as f64;
    let (r_avg, g_avg, b_avg) = (r_sum / n, g_sum / n, b_sum / n);

    let max_channel = r_avg.max(g_avg).max(b_avg);
    if max_channel == 0.0 {
        return 0.0;
    }

    let r_norm = r_avg / max_channel;
    let g_norm = g_avg / max_channel;
    let b_norm = b_avg / max_channel;

    let deviation = ((1.0 - r_norm).powi(2) + (1.0 - g_norm).powi(2) + (1.0 - b_norm).powi(2))
        .sqrt()
        / 3f64.sqrt();

    deviation.min(1.0)
}
