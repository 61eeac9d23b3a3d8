//! Difference hash (d_hash).
//!
//! Resize luminance to 9x8 and compare horizontal neighbors: bit
//! `y*8 + x` is set when pixel (x+1, y) is brighter than pixel (x, y).
//! Gradients survive recompression well, which makes this the workhorse
//! kernel for near-duplicate detection.

use crate::core::preprocess::DecodedImage;

const WIDTH: u32 = 9;
const HEIGHT: u32 = 8;

pub fn compute(image: &DecodedImage) -> u64 {
    let luma = image.luminance_resized(WIDTH, HEIGHT);

    let mut hash = 0u64;
    for y in 0..HEIGHT {
        for x in 0..WIDTH - 1 {
            if luma.get(x + 1, y) > luma.get(x, y) {
                hash |= 1 << (y * 8 + x);
            }
        }
    }
    hash
}
