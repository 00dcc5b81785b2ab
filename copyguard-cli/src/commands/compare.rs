//! Compare command implementation.
//!
//! Fingerprints two local files and runs them through the scorer and the
//! policy engine, the same way a scan treats a single candidate.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use copyguard_core::{decide, no_candidates, score, MediaType, PolicyOutcome};
use serde_json::json;
use tracing::info;

use super::decide::paint;
use super::fingerprint::fingerprint_file;
use crate::utils::{format_score, hash_codes, parse_policy, print_json};

/// Execute the compare command.
pub fn execute(
    content: PathBuf,
    reference: PathBuf,
    text: bool,
    policy: String,
    json: bool,
) -> Result<()> {
    let policy = parse_policy(&policy)?;
    let media_type = if text { MediaType::Text } else { MediaType::Image };

    let query = hash_codes(media_type, vec![fingerprint_file(&content, text)?]);
    let candidate = hash_codes(media_type, vec![fingerprint_file(&reference, text)?]);

    let similarity = score(media_type, &query, &candidate)?;
    let PolicyOutcome { decision, reason } = match similarity {
        Some(s) => decide(media_type, s, policy)?,
        None => no_candidates(),
    };

    info!(
        media_type = media_type.as_str(),
        score = ?similarity,
        decision = decision.as_str(),
        "Compared"
    );

    if json {
        return print_json(&json!({
            "mediaType": media_type.as_str(),
            "policy": policy.as_str(),
            "score": similarity,
            "decision": decision.as_str(),
            "reason": reason,
        }));
    }

    let shown = similarity.map_or_else(|| "n/a".to_string(), format_score);
    println!("{} {}", "Score:".dimmed(), shown.bold());
    println!("{} {}", "Decision:".dimmed(), paint(decision));
    println!("{} {}", "Reason:".dimmed(), reason);
    Ok(())
}
