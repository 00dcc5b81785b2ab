//! Similarity scoring between hash codes.
//!
//! Each family has its own distance and a fixed normalizing length:
//!
//! - perceptual (image, video, audio): differing hex characters at matching
//!   positions, over [`IMAGE_HASH_BITS`] = 256 (64 hex chars)
//! - text simHash: differing bits, over [`TEXT_HASH_BITS`] = 64 (16 hex chars)
//!
//! A pair of codes with different lengths, or with a length other than the
//! canonical one, is not comparable and never contributes to a score.

use std::cmp::Ordering;

use tracing::debug;

use crate::error::{CopyguardError, Result};
use crate::model::{HashCodes, MediaType, ReferenceAsset};

/// Bit length of a canonical perceptual hash.
pub const IMAGE_HASH_BITS: u32 = 256;

/// Bit length of a canonical text simHash.
pub const TEXT_HASH_BITS: u32 = 64;

/// Bit length used to normalize distances for a media type.
pub fn hash_bits(media_type: MediaType) -> u32 {
    if media_type.is_perceptual() {
        IMAGE_HASH_BITS
    } else {
        TEXT_HASH_BITS
    }
}

/// Compute the Hamming distance between two hex-encoded codes as the number
/// of positions holding different hex characters.
///
/// Comparison is case-insensitive.
///
/// # Returns
///
/// - `Ok(Some(distance))` for equal-length codes
/// - `Ok(None)` when the lengths differ (maximally dissimilar)
/// - `Err(InvalidHash)` when either code is empty or not hex
pub fn hamming_distance(a: &str, b: &str) -> Result<Option<u32>> {
    pairwise(a, b, |x, y| u32::from(x != y))
}

/// Compute the number of differing bits between two hex-encoded codes.
///
/// Same contract as [`hamming_distance`]. Used for simHash codes, whose
/// similarity lives in individual bits.
pub fn bit_distance(a: &str, b: &str) -> Result<Option<u32>> {
    pairwise(a, b, |x, y| (x ^ y).count_ones())
}

fn pairwise(a: &str, b: &str, per_nibble: impl Fn(u8, u8) -> u32) -> Result<Option<u32>> {
    let a = decode_nibbles(a)?;
    let b = decode_nibbles(b)?;

    if a.len() != b.len() {
        return Ok(None);
    }

    Ok(Some(
        a.iter().zip(b.iter()).map(|(x, y)| per_nibble(*x, *y)).sum(),
    ))
}

/// Distance function for a media type's hash family.
fn distance_for(media_type: MediaType) -> fn(&str, &str) -> Result<Option<u32>> {
    if media_type.is_perceptual() {
        hamming_distance
    } else {
        bit_distance
    }
}

/// Validate that `code` is hex of the canonical length for `media_type`.
pub fn check_code(media_type: MediaType, code: &str) -> Result<()> {
    let nibbles = decode_nibbles(code)?;
    let expected = (hash_bits(media_type) / 4) as usize;
    if nibbles.len() != expected {
        return Err(CopyguardError::InvalidHash(format!(
            "{media_type} hash must be {expected} hex characters, got {}",
            nibbles.len()
        )));
    }
    Ok(())
}

/// Validate every code `hashes` carries for `media_type`, requiring at least one.
pub fn check_codes(media_type: MediaType, hashes: &HashCodes) -> Result<()> {
    let codes = hashes.codes_for(media_type);
    if codes.is_empty() {
        return Err(CopyguardError::InvalidHash(format!(
            "no {} hash provided for {media_type}",
            if media_type.is_perceptual() { "pHash" } else { "simHash" }
        )));
    }
    codes.into_iter().try_for_each(|code| check_code(media_type, code))
}

fn decode_nibbles(code: &str) -> Result<Vec<u8>> {
    if code.is_empty() {
        return Err(CopyguardError::InvalidHash("empty hash code".into()));
    }

    code.chars()
        .map(|c| {
            c.to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| {
                    CopyguardError::InvalidHash(format!("non-hex character {c:?} in {code:?}"))
                })
        })
        .collect()
}

/// Score a candidate's hash set against the query's.
///
/// Returns the similarity `1 - min_distance / length` over every comparable
/// pair, or `None` when the candidate has no code comparable to the query.
/// An empty candidate set is never scored as zero.
pub fn score(
    media_type: MediaType,
    query: &HashCodes,
    candidate: &HashCodes,
) -> Result<Option<f64>> {
    let bits = hash_bits(media_type);
    let canonical_len = (bits / 4) as usize;
    let distance_fn = distance_for(media_type);

    let mut min_distance: Option<u32> = None;
    for q in query.codes_for(media_type) {
        for c in candidate.codes_for(media_type) {
            let Some(distance) = distance_fn(q, c)? else {
                continue;
            };
            if q.len() != canonical_len {
                continue;
            }
            min_distance = Some(min_distance.map_or(distance, |m| m.min(distance)));
        }
    }

    Ok(min_distance.map(|d| 1.0 - f64::from(d) / f64::from(bits)))
}

/// A reference asset together with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub reference: ReferenceAsset,
    pub score: f64,
}

/// Score every candidate, dropping the ones with no comparable code.
pub fn score_candidates(
    media_type: MediaType,
    query: &HashCodes,
    candidates: Vec<ReferenceAsset>,
) -> Result<Vec<ScoredCandidate>> {
    let mut scored = Vec::with_capacity(candidates.len());
    for reference in candidates {
        match score(media_type, query, &reference.hashes)? {
            Some(score) => scored.push(ScoredCandidate { reference, score }),
            None => debug!(ref_id = %reference.id, "Candidate has no comparable hash, skipped"),
        }
    }
    Ok(scored)
}

/// Total order used to pick the best candidate: highest score, then most
/// recently updated reference, then lowest reference id.
pub fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.reference.updated_at.cmp(&a.reference.updated_at))
        .then_with(|| a.reference.id.cmp(&b.reference.id))
}

/// Select the best scored candidate, if any.
pub fn select_best(scored: Vec<ScoredCandidate>) -> Option<ScoredCandidate> {
    scored.into_iter().min_by(compare_candidates)
}
