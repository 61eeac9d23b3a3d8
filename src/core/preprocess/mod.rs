//! # Image Preprocessor
//!
//! Decodes image files and produces the normalized buffers the hash and
//! quality kernels consume: an 8-bit single-channel luminance plane
//! (optionally resized with Lanczos-3) and the RGB plane at decode
//! resolution.
//!
//! Luminance is the per-pixel mean of R, G and B. EXIF orientation is
//! observed by the metadata extractor but never applied here, so rotated
//! copies of an image produce different fingerprints.

use crate::error::DecodeError;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::path::Path;

/// Minimum dimension for the variance-based kernels (sharpness, noise)
pub const MIN_VARIANCE_SIZE: u32 = 3;

/// Minimum dimension for the DCT kernel (p_hash)
pub const MIN_DCT_SIZE: u32 = 16;

/// A single-channel 8-bit luminance plane
#[derive(Debug, Clone)]
pub struct LumaBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl LumaBuffer {
    /// Build a luminance plane from an RGB buffer (mean of channels)
    pub fn from_rgb(rgb: &RgbImage) -> Self {
        let (width, height) = rgb.dimensions();
        let pixels = rgb
            .pixels()
            .map(|p| {
                let sum = p.0[0] as u16 + p.0[1] as u16 + p.0[2] as u16;
                (sum / 3) as u8
            })
            .collect();
        Self { width, height, pixels }
    }

    /// Build directly from raw pixel data. Panics if the length does not
    /// match the dimensions; intended for tests and kernels.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(pixels.len(), (width * height) as usize);
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at (x, y); row-major storage
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// A decoded image plus the format the decoder recognized
#[derive(Debug)]
pub struct DecodedImage {
    image: DynamicImage,
    format: String,
}

impl DecodedImage {
    /// Decode a file, guessing the format from content
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let reader = image::ImageReader::open(path)
            .map_err(|e| DecodeError::Io {
                path: path.to_path_buf(),
                source: e,
            })?
            .with_guessed_format()
            .map_err(|e| DecodeError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        let format = match reader.format() {
            Some(f) => format_name(f).to_string(),
            None => {
                return Err(DecodeError::UnsupportedFormat {
                    format: path
                        .extension()
                        .map(|e| e.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "unknown".to_string()),
                })
            }
        };

        let image = reader.decode().map_err(|e| DecodeError::DecodeFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self { image, format })
    }

    /// Wrap an already-decoded image (tests, in-memory pipelines)
    pub fn from_image(image: DynamicImage, format: &str) -> Self {
        Self {
            image,
            format: format.to_string(),
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The RGB plane at decode resolution
    pub fn rgb(&self) -> RgbImage {
        self.image.to_rgb8()
    }

    /// Luminance plane at decode resolution
    pub fn luminance(&self) -> LumaBuffer {
        LumaBuffer::from_rgb(&self.image.to_rgb8())
    }

    /// Luminance plane resampled to exactly `width` x `height` with
    /// Lanczos-3
    pub fn luminance_resized(&self, width: u32, height: u32) -> LumaBuffer {
        let resized = self
            .image
            .resize_exact(width, height, FilterType::Lanczos3)
            .to_rgb8();
        LumaBuffer::from_rgb(&resized)
    }

    /// Fail when the image is below the minimum for a kernel family
    pub fn ensure_min_size(&self, min: u32, path: &Path) -> Result<(), DecodeError> {
        if self.width() < min || self.height() < min {
            return Err(DecodeError::ImageTooSmall {
                path: path.to_path_buf(),
                width: self.width(),
                height: self.height(),
                min,
            });
        }
        Ok(())
    }
}

fn format_name(format: image::ImageFormat) -> &'static str {
    use image::ImageFormat;
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Gif => "gif",
        _ => "other",
    }
}
