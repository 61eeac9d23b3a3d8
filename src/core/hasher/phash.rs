//! Perception hash (p_hash).
//!
//! Resize luminance to 32x32, apply a 2-D type-II DCT, keep the top-left
//! 8x8 low-frequency block. Bits compare each of the 63 non-DC
//! coefficients against their mean; the DC term is skipped and bit 63 is
//! left zero. Packing is row-major over the 63 retained coefficients,
//! least significant bit first.
//!
//! The transform is the row/column separable O(N^3) form of the direct
//! DCT; the sign pattern relative to the mean is identical.

use crate::core::preprocess::{DecodedImage, MIN_DCT_SIZE};
use crate::error::DecodeError;
use std::f64::consts::PI;
use std::path::Path;

const SIZE: usize = 32;
const BLOCK: usize = 8;

pub fn compute(image: &DecodedImage, path: &Path) -> Result<u64, DecodeError> {
    image.ensure_min_size(MIN_DCT_SIZE, path)?;

    let luma = image.luminance_resized(SIZE as u32, SIZE as u32);

    let mut matrix = [[0f64; SIZE]; SIZE];
    for y in 0..SIZE {
        for x in 0..SIZE {
            matrix[y][x] = luma.get(x as u32, y as u32) as f64 / 255.0;
        }
    }

    let dct = dct_2d(&matrix);

    // Mean over the 63 low-frequency coefficients, DC excluded
    let mut sum = 0.0;
    for v in 0..BLOCK {
        for u in 0..BLOCK {
            if u == 0 && v == 0 {
                continue;
            }
            sum += dct[v][u];
        }
    }
    let mean = sum / 63.0;

    let mut hash = 0u64;
    let mut bit = 0u32;
    for v in 0..BLOCK {
        for u in 0..BLOCK {
            if u == 0 && v == 0 {
                continue;
            }
            if dct[v][u] > mean {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    Ok(hash)
}

/// Separable 2-D DCT-II: transform rows, then columns.
///
/// `out[v][u] = sum_y sum_x m[y][x] cos((2y+1) v pi / 2N) cos((2x+1) u pi / 2N)`
fn dct_2d(matrix: &[[f64; SIZE]; SIZE]) -> [[f64; SIZE]; SIZE] {
    // Precomputed cosine basis: basis[k][n] = cos((2n+1) k pi / 2N)
    let mut basis = [[0f64; SIZE]; SIZE];
    for (k, row) in basis.iter_mut().enumerate() {
        for (n, value) in row.iter_mut().enumerate() {
            *value = (((2 * n + 1) * k) as f64 * PI / (2.0 * SIZE as f64)).cos();
        }
    }

    // Rows: tmp[y][u] = sum_x m[y][x] * basis[u][x]
    let mut tmp = [[0f64; SIZE]; SIZE];
    for y in 0..SIZE {
        for u in 0..SIZE {
            let mut sum = 0.0;
            for x in 0..SIZE {
                sum += matrix[y][x] * basis[u][x];
            }
            tmp[y][u] = sum;
        }
    }

    // Columns: out[v][u] = sum_y tmp[y][u] * basis[v][y]
    let mut out = [[0f64; SIZE]; SIZE];
    for v in 0..SIZE {
        for u in 0..SIZE {
            let mut sum = 0.0;
            for y in 0..SIZE {
                sum += tmp[y][u] * basis[v][y];
            }
            out[v][u] = sum;
        }
    }
    out
}
