//! Average hash (a_hash).
//!
//! Resize luminance to 8x8, compare every pixel against the plane mean.
//! Bit `i` (row-major, least significant first) is set when pixel `i`
//! exceeds the mean. Fast, and exact-duplicate friendly; weak against
//! edits that shift overall brightness.

use crate::core::preprocess::DecodedImage;

const SIZE: u32 = 8;

pub fn compute(image: &DecodedImage) -> u64 {
    let luma = image.luminance_resized(SIZE, SIZE);

    let sum: u64 = luma.pixels().iter().map(|&p| p as u64).sum();
    let mean = sum / (SIZE * SIZE) as u64;

    let mut hash = 0u64;
    for (i, &pixel) in luma.pixels().iter().enumerate() {
        if pixel as u64 > mean {
            hash |= 1 << i;
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb};

    fn decoded(img: ImageBuffer<Rgb<u8>, Vec<u8>>) -> DecodedImage {
        DecodedImage::from_image(DynamicImage::ImageRgb8(img), "png")
    }

    #[test]
    fn half_split_sets_bright_half_bits() {
        // Left half black, right half white: mean 127, white pixels win
        let img = ImageBuffer::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let hash = compute(&decoded(img));
        assert_eq!(hash, 0xF0F0_F0F0_F0F0_F0F0);
    }

    #[test]
    fn flat_image_hashes_to_zero() {
        // No pixel exceeds the mean of a constant plane
        let img = ImageBuffer::from_fn(8, 8, |_, _| Rgb([128, 128, 128]));
        assert_eq!(compute(&decoded(img)), 0);
    }

    #[test]
    fn resolution_invariance_for_strong_pattern() {
        let small = ImageBuffer::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let large = ImageBuffer::from_fn(128, 128, |x, _| {
            if x < 64 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let h1 = compute(&decoded(small));
        let h2 = compute(&decoded(large));
        assert!(crate::core::hasher::hamming(h1, h2) <= 8);
    }
}
