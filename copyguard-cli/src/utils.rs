//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use copyguard_core::{HashCodes, MediaType, Policy};
use tracing::debug;

/// Read a whole input file.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read file");
    Ok(bytes)
}

/// Read an input file as UTF-8 text.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = read_file(path)?;
    String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8 text", path.display()))
}

pub fn parse_media_type(raw: &str) -> Result<MediaType> {
    raw.parse::<MediaType>()
        .with_context(|| format!("Invalid --media-type '{raw}'"))
}

pub fn parse_policy(raw: &str) -> Result<Policy> {
    raw.parse::<Policy>()
        .with_context(|| format!("Invalid --policy '{raw}'"))
}

/// Wrap raw codes into the hash family used by `media_type`.
pub fn hash_codes(media_type: MediaType, codes: Vec<String>) -> HashCodes {
    if media_type.is_perceptual() {
        HashCodes::perceptual(codes)
    } else {
        HashCodes {
            phash: Vec::new(),
            simhash: codes.into_iter().next(),
        }
    }
}

/// Format a similarity score for display.
pub fn format_score(score: f64) -> String {
    format!("{score:.4}")
}

/// Print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}
