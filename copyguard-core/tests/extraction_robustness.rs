//! Robustness tests for fingerprint extraction.
//!
//! Perceptual hashes of re-encoded or rescaled copies must still score
//! above the review threshold, while unrelated content must not.

use copyguard_core::{
    decide, score, simhash, Decision, HashCodes, MediaType, PerceptualHasher, Policy, Thresholds,
};
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use std::io::Cursor;

/// Create a test image with recognizable patterns.
fn create_test_image(width: u32, height: u32) -> RgbImage {
    let mut img = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let r = ((x as f32 / width as f32) * 255.0) as u8;
        let g = ((y as f32 / height as f32) * 255.0) as u8;
        let b = (((x + y) as f32 / (width + height) as f32) * 200.0) as u8;

        let pattern = if (x / 40 + y / 40) % 2 == 0 { 60 } else { 0 };
        *pixel = Rgb([r.saturating_add(pattern), g, b]);
    }

    img
}

fn compress_jpeg(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    img.write_with_encoder(encoder)
        .expect("JPEG encoding failed");
    buffer.into_inner()
}

fn invert(img: &DynamicImage) -> DynamicImage {
    let mut inverted = img.clone();
    inverted.invert();
    inverted
}

fn image_score(a: &str, b: &str) -> f64 {
    score(
        MediaType::Image,
        &HashCodes::perceptual(vec![a.to_string()]),
        &HashCodes::perceptual(vec![b.to_string()]),
    )
    .expect("valid hashes")
    .expect("comparable hashes")
}

// ============================================================================
// Perceptual hash robustness
// ============================================================================

#[test]
fn test_jpeg_copy_scores_above_review_threshold() {
    let original = DynamicImage::ImageRgb8(create_test_image(320, 240));
    let hasher = PerceptualHasher;

    let base = hasher.hash_image(&original);
    let jpeg = hasher
        .hash_bytes(&compress_jpeg(&original, 60))
        .expect("JPEG should decode");

    let s = image_score(&base, &jpeg);
    assert!(
        s >= Thresholds::for_media(MediaType::Image).review,
        "JPEG copy scored {s}"
    );
}

#[test]
fn test_downscaled_copy_scores_above_review_threshold() {
    let original = DynamicImage::ImageRgb8(create_test_image(400, 400));
    let (w, h) = original.dimensions();
    let small = original.resize_exact(w / 2, h / 2, image::imageops::FilterType::Lanczos3);

    let hasher = PerceptualHasher;
    let s = image_score(&hasher.hash_image(&original), &hasher.hash_image(&small));
    assert!(s >= 0.75, "downscaled copy scored {s}");
}

#[test]
fn test_inverted_image_is_not_a_match() {
    let original = DynamicImage::ImageRgb8(create_test_image(256, 256));
    let hasher = PerceptualHasher;

    let s = image_score(&hasher.hash_image(&original), &hasher.hash_image(&invert(&original)));
    assert!(s < 0.5, "inverted image scored {s}");

    let outcome = decide(MediaType::Image, s, Policy::Block).unwrap();
    assert_eq!(outcome.decision, Decision::Allow);
}

// ============================================================================
// Text simHash
// ============================================================================

#[test]
fn test_reformatted_text_is_exact_simhash_match() {
    let original = "Never gonna give you up, never gonna let you down";
    let reposted = "NEVER gonna give you up... never gonna let you down!!";

    let a = HashCodes::text(simhash(original));
    let b = HashCodes::text(simhash(reposted));
    assert_eq!(score(MediaType::Text, &a, &b).unwrap(), Some(1.0));

    let outcome = decide(MediaType::Text, 1.0, Policy::Block).unwrap();
    assert_eq!(outcome.decision, Decision::Violation);
}

#[test]
fn test_empty_text_fingerprint_is_canonical() {
    let empty = simhash("");
    assert_eq!(empty.len(), 16);
    assert!(empty.chars().all(|c| c == '0'));
}
