//! Fingerprint command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use copyguard_core::{simhash, MediaType, PerceptualHasher};
use serde_json::json;
use tracing::info;

use crate::utils::{print_json, read_file, read_text};

/// Compute one hash code for a local file.
pub fn fingerprint_file(path: &Path, text: bool) -> Result<String> {
    if text {
        let body = read_text(path)?;
        return Ok(simhash(&body));
    }

    let bytes = read_file(path)?;
    PerceptualHasher
        .hash_bytes(&bytes)
        .with_context(|| format!("Cannot fingerprint {}", path.display()))
}

/// Execute the fingerprint command.
pub fn execute(files: Vec<PathBuf>, text: bool, json: bool) -> Result<()> {
    let media_type = if text { MediaType::Text } else { MediaType::Image };

    let mut codes = Vec::with_capacity(files.len());
    for file in &files {
        let code = fingerprint_file(file, text)?;
        info!(
            path = %file.display(),
            media_type = media_type.as_str(),
            code = %code,
            "Fingerprinted"
        );
        codes.push(code);
    }

    if json {
        let entries: Vec<_> = files
            .iter()
            .zip(&codes)
            .map(|(file, code)| json!({ "file": file.display().to_string(), "hash": code }))
            .collect();
        return print_json(&json!({ "mediaType": media_type.as_str(), "fingerprints": entries }));
    }

    let label = if text { "simHash" } else { "pHash" };
    for (file, code) in files.iter().zip(&codes) {
        println!("{}  {} {}", code.bold(), label.dimmed(), file.display());
    }
    Ok(())
}
