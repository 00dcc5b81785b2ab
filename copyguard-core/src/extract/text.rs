//! 64-bit simHash over frequency-weighted tokens.
//!
//! Text is lowercased and split on every non-alphanumeric character. Each
//! distinct token contributes its SHA3-256-derived 64-bit hash, weighted by
//! how often it occurs. Empty input hashes to all zeros.

use std::collections::HashMap;

use async_trait::async_trait;
use sha3::{Digest, Sha3_256};

use super::TextExtractor;
use crate::error::Result;

/// Compute the simHash of `text` as 16 lowercase hex characters.
pub fn simhash(text: &str) -> String {
    let lowered = text.to_lowercase();

    let mut weights: HashMap<&str, i64> = HashMap::new();
    for token in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *weights.entry(token).or_insert(0) += 1;
    }

    let mut accumulator = [0i64; 64];
    for (token, weight) in &weights {
        let h = token_hash(token);
        for (bit, slot) in accumulator.iter_mut().enumerate() {
            if (h >> bit) & 1 == 1 {
                *slot += weight;
            } else {
                *slot -= weight;
            }
        }
    }

    let code = accumulator
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0)
        .fold(0u64, |acc, (bit, _)| acc | (1u64 << bit));

    format!("{code:016x}")
}

fn token_hash(token: &str) -> u64 {
    let digest = Sha3_256::digest(token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// [`TextExtractor`] computing [`simhash`] in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimHasher;

#[async_trait]
impl TextExtractor for SimHasher {
    async fn extract(&self, text: &str) -> Result<String> {
        Ok(simhash(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::bit_distance;

    #[test]
    fn test_empty_text_is_zero() {
        assert_eq!(simhash(""), "0000000000000000");
        assert_eq!(simhash("  ,.;  "), "0000000000000000");
    }

    #[test]
    fn test_simhash_is_16_hex_chars() {
        let h = simhash("The quick brown fox jumps over the lazy dog");
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_simhash_ignores_case_and_punctuation() {
        assert_eq!(simhash("Hello, World!"), simhash("hello world"));
    }

    #[test]
    fn test_simhash_deterministic() {
        let text = "copyright protected lyrics line one line two";
        assert_eq!(simhash(text), simhash(text));
    }

    #[test]
    fn test_single_token_equals_token_hash() {
        assert_eq!(simhash("alpha"), format!("{:016x}", token_hash("alpha")));
    }

    #[test]
    fn test_similar_texts_are_closer_than_unrelated() {
        let base = "the rain in spain stays mainly in the plain every single year";
        let edited = "the rain in spain stays mainly in the plain every single day";
        let unrelated = "quarterly revenue grew across all regional sales divisions";
        let near = bit_distance(&simhash(base), &simhash(edited)).unwrap().unwrap();
        let far = bit_distance(&simhash(base), &simhash(unrelated)).unwrap().unwrap();
        assert!(near < far, "near={near} far={far}");
    }

    #[tokio::test]
    async fn test_text_extractor_matches_function() {
        let out = SimHasher.extract("some caption").await.unwrap();
        assert_eq!(out, simhash("some caption"));
    }
}
