//! Compression artifact detection.
//!
//! Three spatial-domain heuristics, each a fraction in [0, 1], averaged:
//! blockiness at 8x8 block boundaries, ringing around strong edges, and
//! high-frequency noise inside smooth regions. Thresholds are empirical,
//! in 8-bit luminance units.

use crate::core::preprocess::LumaBuffer;

const BLOCK: u32 = 8;
/// Luminance step across a block boundary that counts as an artifact
const BLOCK_STEP_THRESHOLD: f64 = 39.0;
/// Edge strength that qualifies for ringing inspection
const EDGE_THRESHOLD: f64 = 58.0;
/// Step size that counts as an oscillation direction change
const OSCILLATION_STEP: f64 = 4.0;
/// Neighborhood gradient below which a pixel counts as smooth
const SMOOTH_GRADIENT: f64 = 19.0;
/// 3x3 variance above which a smooth pixel carries HF noise
const HF_VARIANCE_THRESHOLD: f64 = 64.0;

/// Compression score in [0, 1]; images under 16x16 default to 0.1
pub fn analyze(luma: &LumaBuffer) -> f64 {
    if luma.width() < 16 || luma.height() < 16 {
        return 0.1;
    }

    let score = (blockiness(luma) + ringing(luma) + smooth_region_noise(luma)) / 3.0;
    score.min(1.0)
}

/// Fraction of 8x8 block boundaries with a luminance discontinuity
fn blockiness(luma: &LumaBuffer) -> f64 {
    let (width, height) = (luma.width(), luma.height());
    let mut artifacts = 0u64;

    let mut y = BLOCK;
    while y < height - BLOCK {
        let mut x = BLOCK;
        while x < width - BLOCK {
            let horizontal =
                (luma.get(x - 1, y) as f64 - luma.get(x, y) as f64).abs();
            let vertical = (luma.get(x, y - 1) as f64 - luma.get(x, y) as f64).abs();

            if horizontal > BLOCK_STEP_THRESHOLD || vertical > BLOCK_STEP_THRESHOLD {
                artifacts += 1;
            }
            x += BLOCK;
        }
        y += BLOCK;
    }

    let total = ((width / BLOCK).saturating_sub(1) * (height / BLOCK).saturating_sub(1)) as f64;
    if total == 0.0 {
        return 0.0;
    }
    (artifacts as f64 / total).min(1.0)
}

/// Fraction of strong edges flanked by alternating-sign oscillations
fn ringing(luma: &LumaBuffer) -> f64 {
    let (width, height) = (luma.width(), luma.height());
    let mut artifacts = 0u64;

    let mut y = 1;
    while y < height - 1 {
        let mut x = 1;
        while x < width - 1 {
            let center = luma.get(x, y) as f64;
            let left = luma.get(x - 1, y) as f64;
            let right = luma.get(x + 1, y) as f64;

            let edge_strength = (center - left).abs().max((center - right).abs());
            if edge_strength > EDGE_THRESHOLD && x > 2 && x < width - 3 {
                let before = oscillation(luma, x - 3, x, y);
                let after = oscillation(luma, x, x + 3, y);
                if before > 0.5 || after > 0.5 {
                    artifacts += 1;
                }
            }
            x += 2;
        }
        y += 2;
    }

    let total = (((width - 2) / 2) * ((height - 2) / 2)) as f64;
    if total == 0.0 {
        return 0.0;
    }
    (artifacts as f64 / total).min(1.0)
}

/// Sign-change density along a horizontal run of pixels
fn oscillation(luma: &LumaBuffer, start_x: u32, end_x: u32, y: u32) -> f64 {
    let mut oscillations = 0u32;
    let mut last_direction = 0i8;
    let mut previous = luma.get(start_x, y) as f64;

    for x in start_x + 1..=end_x {
        let current = luma.get(x, y) as f64;
        let diff = current - previous;

        let direction = if diff > OSCILLATION_STEP {
            1i8
        } else if diff < -OSCILLATION_STEP {
            -1i8
        } else {
            0
        };

        if last_direction != 0 && direction != 0 && direction != last_direction {
            oscillations += 1;
        }
        if direction != 0 {
            last_direction = direction;
        }
        previous = current;
    }

    oscillations as f64 / (end_x - start_x) as f64
}

/// Fraction of smooth-region samples whose 3x3 variance is high
fn smooth_region_noise(luma: &LumaBuffer) -> f64 {
    let (width, height) = (luma.width(), luma.height());
    let mut noisy = 0u64;
    let mut samples = 0u64;

    let mut y = 2;
    while y < height - 2 {
        let mut x = 2;
        while x < width - 2 {
            if is_smooth(luma, x, y) {
                samples += 1;
                if neighborhood_variance(luma, x, y) > HF_VARIANCE_THRESHOLD {
                    noisy += 1;
                }
            }
            x += 4;
        }
        y += 4;
    }

    if samples == 0 {
        return 0.0;
    }
    (noisy as f64 / samples as f64).min(1.0)
}

fn is_smooth(luma: &LumaBuffer, x: u32, y: u32) -> bool {
    let center = luma.get(x, y) as f64;
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let neighbor = luma.get((x as i32 + dx) as u32, (y as i32 + dy) as u32) as f64;
            if (center - neighbor).abs() >= SMOOTH_GRADIENT {
                return false;
            }
        }
    }
    true
}

fn neighborhood_variance(luma: &LumaBuffer, x: u32, y: u32) -> f64 {
    let mut values = [0f64; 9];
    let mut i = 0;
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            values[i] = luma.get((x as i32 + dx) as u32, (y as i32 + dy) as u32) as f64;
            i += 1;
        }
    }
    let mean = values.iter().sum::<f64>() / 9.0;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / 9.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: u32, height: u32, value: u8) -> LumaBuffer {
        LumaBuffer::from_raw(width, height, vec![value; (width * height) as usize])
    }

    #[test]
    fn tiny_image_defaults() {
        assert_eq!(analyze(&flat(8, 8, 128)), 0.1);
    }

    #[test]
    fn flat_image_shows_no_artifacts() {
        assert_eq!(analyze(&flat(64, 64, 128)), 0.0);
    }

    #[test]
    fn blocky_image_scores_high_blockiness() {
        // 8x8 tiles alternating between two strongly different levels
        let pixels = (0..64u32 * 64)
            .map(|i| {
                let (x, y) = (i % 64, i / 64);
                if ((x / 8) + (y / 8)) % 2 == 0 {
                    60
                } else {
                    180
                }
            })
            .collect();
        let luma = LumaBuffer::from_raw(64, 64, pixels);
        assert!(blockiness(&luma) > 0.5);
    }

    #[test]
    fn smooth_gradient_is_not_blocky() {
        let pixels = (0..64u32 * 64).map(|i| ((i % 64) * 4) as u8).collect();
        let luma = LumaBuffer::from_raw(64, 64, pixels);
        assert_eq!(blockiness(&luma), 0.0);
    }

    #[test]
    fn score_stays_in_bounds() {
        let pixels = (0..64u32 * 64)
            .map(|i| if i % 3 == 0 { 0 } else { 255 })
            .collect();
        let luma = LumaBuffer::from_raw(64, 64, pixels);
        let score = analyze(&luma);
        assert!((0.0..=1.0).contains(&score));
    }
}
