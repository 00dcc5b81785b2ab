//! Perceptual hashing for images.
//!
//! Images are decoded, converted to RGB8 and resized to a canonical
//! [`NORMALIZED_SIZE`]×[`NORMALIZED_SIZE`] before hashing, so re-encoded or
//! rescaled copies of the same picture land close in Hamming space.
//!
//! # Algorithm
//!
//! Blockhash with a 16×16 grid, producing a 256-bit (32 byte) hash encoded as
//! 64 lowercase hex characters.

use blockhash::{blockhash256, Blockhash256};
use image::{imageops::FilterType, DynamicImage};

use crate::error::{CopyguardError, Result};

/// Side length, in pixels, images are normalized to before hashing.
pub const NORMALIZED_SIZE: u32 = 256;

/// Hash size in bytes (256 bits).
pub const PERCEPTUAL_HASH_SIZE: usize = 32;

/// Computes 256-bit perceptual hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerceptualHasher;

impl PerceptualHasher {
    /// Compute the hex-encoded perceptual hash of raw image bytes.
    ///
    /// Supports JPEG, PNG, GIF, and WebP formats.
    pub fn hash_bytes(&self, image_data: &[u8]) -> Result<String> {
        let image = image::load_from_memory(image_data).map_err(|e| {
            CopyguardError::ExtractionFailure(format!("Failed to decode image: {e}"))
        })?;

        Ok(self.hash_image(&image))
    }

    /// Compute the hex-encoded perceptual hash of a decoded image.
    pub fn hash_image(&self, image: &DynamicImage) -> String {
        let normalized = DynamicImage::ImageRgb8(image::imageops::resize(
            &image.to_rgb8(),
            NORMALIZED_SIZE,
            NORMALIZED_SIZE,
            FilterType::Triangle,
        ));

        let hash: Blockhash256 = blockhash256(&normalized);
        let bytes: [u8; PERCEPTUAL_HASH_SIZE] = hash.into();
        hex::encode(bytes)
    }

    /// Check if the provided bytes appear to be a supported image format.
    pub fn is_supported_format(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }
}
