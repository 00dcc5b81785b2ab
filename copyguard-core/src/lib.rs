//! Copyguard Core - copyright match detection primitives
//!
//! This crate provides the pure building blocks of the Copyguard scanning
//! pipeline: fingerprint extraction, similarity scoring and policy decisions.
//! Persistence, job execution and enforcement live in `copyguard-server`.
//!
//! # Features
//!
//! - 256-bit perceptual image hashes (blockhash over a normalized 256×256 RGB image)
//! - 64-bit text simHash over SHA3-derived token hashes
//! - Bit-level Hamming similarity with fixed per-family hash lengths
//! - Deterministic block / track / allow policy engine
//!
//! # Example
//!
//! ```
//! use copyguard_core::{decide, score, Decision, HashCodes, MediaType, Policy};
//!
//! # fn example() -> copyguard_core::Result<()> {
//! let query = HashCodes::perceptual(vec!["ab".repeat(32)]);
//! let reference = HashCodes::perceptual(vec!["ab".repeat(32)]);
//!
//! let similarity = score(MediaType::Image, &query, &reference)?.unwrap_or(0.0);
//! let outcome = decide(MediaType::Image, similarity, Policy::Block)?;
//! assert_eq!(outcome.decision, Decision::Violation);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod error;
pub mod extract;
pub mod model;
pub mod policy;
pub mod similarity;

// Re-export main types for convenience
pub use error::{CopyguardError, Result};
pub use model::{
    normalize_hex, ContentKind, ContentRef, ContentStatus, Decision, Fingerprint, HashCodes,
    MatchRecord, MediaType, ModerationState, Policy, ReferenceAsset, ScanStatus,
};
pub use policy::{decide, no_candidates, PolicyOutcome, Thresholds};
pub use similarity::{
    bit_distance, check_code, check_codes, hamming_distance, score, score_candidates, select_best,
    ScoredCandidate, IMAGE_HASH_BITS, TEXT_HASH_BITS,
};

pub use extract::{simhash, ImageExtractor, MockImageExtractor, SimHasher, TextExtractor};

// Network-dependent exports
#[cfg(all(feature = "network", feature = "perceptual-hash"))]
pub use extract::{FetchConfig, HttpImageExtractor};

#[cfg(feature = "perceptual-hash")]
pub use extract::PerceptualHasher;

#[cfg(test)]
mod tests {
    use super::*;

    /// Identical image hashes under a block policy end in a violation.
    #[test]
    fn test_identical_image_under_block_is_violation() {
        let hashes = HashCodes::perceptual(vec!["0f".repeat(32)]);
        let s = score(MediaType::Image, &hashes, &hashes).unwrap().unwrap();
        assert_eq!(s, 1.0);
        let outcome = decide(MediaType::Image, s, Policy::Block).unwrap();
        assert_eq!(outcome.decision, Decision::Violation);
    }

    /// Identical simHash under a track policy is only flagged for review.
    #[test]
    fn test_identical_text_under_track_is_review() {
        let hashes = HashCodes::text(simhash("all rights reserved lyrics"));
        let s = score(MediaType::Text, &hashes, &hashes).unwrap().unwrap();
        let outcome = decide(MediaType::Text, s, Policy::Track).unwrap();
        assert_eq!(outcome.decision, Decision::Review);
    }
}
