//! Wavelet hash (w_hash).
//!
//! Resize luminance to a power-of-two plane (64 by default), run a
//! canonical orthonormal 2-D Haar decomposition down to an 8x8
//! approximation (level log2(size) - 3), then compare the absolute value
//! of the 63 non-DC coefficients of that block against their mean. DC is
//! skipped and packing matches p_hash: row-major, LSB first, bit 63 zero.
//!
//! Tolerates rescaling and mild cropping better than the spatial hashes.

use crate::core::preprocess::DecodedImage;

/// Resample target; the nearest power of two in [8, 64]
const SIZE: usize = 64;
const BLOCK: usize = 8;

pub fn compute(image: &DecodedImage) -> u64 {
    let luma = image.luminance_resized(SIZE as u32, SIZE as u32);

    let mut matrix = vec![vec![0f64; SIZE]; SIZE];
    for (y, row) in matrix.iter_mut().enumerate() {
        for (x, value) in row.iter_mut().enumerate() {
            *value = luma.get(x as u32, y as u32) as f64 / 255.0;
        }
    }

    haar_decompose(&mut matrix, SIZE, BLOCK);

    // Mean of absolute values over the 63 non-DC coefficients
    let mut sum = 0.0;
    for y in 0..BLOCK {
        for x in 0..BLOCK {
            if x == 0 && y == 0 {
                continue;
            }
            sum += matrix[y][x].abs();
        }
    }
    let mean = sum / 63.0;

    let mut hash = 0u64;
    let mut bit = 0u32;
    for y in 0..BLOCK {
        for x in 0..BLOCK {
            if x == 0 && y == 0 {
                continue;
            }
            if matrix[y][x].abs() > mean {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    hash
}

/// In-place canonical Haar decomposition.
///
/// Each level transforms the active top-left `n x n` region: rows first
/// ((a+b)/sqrt(2) into the left half, (a-b)/sqrt(2) into the right),
/// then columns the same way, halving `n` until it reaches `stop`.
fn haar_decompose(matrix: &mut [Vec<f64>], size: usize, stop: usize) {
    let sqrt2 = std::f64::consts::SQRT_2;
    let mut n = size;

    while n > stop {
        let half = n / 2;
        let mut scratch = vec![0f64; n];

        for row in matrix.iter_mut().take(n) {
            for x in 0..half {
                let a = row[2 * x];
                let b = row[2 * x + 1];
                scratch[x] = (a + b) / sqrt2;
                scratch[x + half] = (a - b) / sqrt2;
            }
            row[..n].copy_from_slice(&scratch);
        }

        for x in 0..n {
            for y in 0..half {
                let a = matrix[2 * y][x];
                let b = matrix[2 * y + 1][x];
                scratch[y] = (a + b) / sqrt2;
                scratch[y + half] = (a - b) / sqrt2;
            }
            for y in 0..n {
                matrix[y][x] = scratch[y];
            }
        }

        n = half;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::hamming;
    use image::{DynamicImage, ImageBuffer, Rgb};

    fn decoded(img: ImageBuffer<Rgb<u8>, Vec<u8>>) -> DecodedImage {
        DecodedImage::from_image(DynamicImage::ImageRgb8(img), "png")
    }

    #[test]
    fn flat_image_hashes_to_zero() {
        // The LL3 approximation of a constant plane is constant, so no
        // coefficient strictly exceeds the mean
        let img = ImageBuffer::from_fn(64, 64, |_, _| Rgb([200, 200, 200]));
        assert_eq!(compute(&decoded(img)), 0);
    }

    #[test]
    fn haar_preserves_total_energy() {
        let mut matrix = vec![vec![0f64; 8]; 8];
        matrix[0][0] = 1.0;
        matrix[3][5] = -2.0;
        let before: f64 = matrix.iter().flatten().map(|v| v * v).sum();

        haar_decompose(&mut matrix, 8, 2);

        let after: f64 = matrix.iter().flatten().map(|v| v * v).sum();
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn structured_image_produces_nonzero_hash() {
        let img = ImageBuffer::from_fn(64, 64, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        assert_ne!(compute(&decoded(img)), 0);
    }

    #[test]
    fn rescaled_image_stays_close() {
        let large = ImageBuffer::from_fn(256, 256, |x, y| {
            let v = ((x + y) * 255 / 512) as u8;
            Rgb([v, v, v])
        });
        let small =
            image::imageops::resize(&large, 64, 64, image::imageops::FilterType::Triangle);

        let h1 = compute(&decoded(large));
        let h2 = compute(&decoded(small));
        assert!(hamming(h1, h2) <= 8);
    }
}
