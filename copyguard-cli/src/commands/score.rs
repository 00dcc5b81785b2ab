//! Score command implementation.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use copyguard_core::{check_codes, score};
use serde_json::json;
use tracing::debug;

use crate::utils::{format_score, hash_codes, parse_media_type, print_json};

/// Execute the score command.
pub fn execute(
    media_type: String,
    query: Vec<String>,
    candidate: Vec<String>,
    json: bool,
) -> Result<()> {
    let media_type = parse_media_type(&media_type)?;
    if !media_type.is_perceptual() && (query.len() > 1 || candidate.len() > 1) {
        bail!("Text hashes take a single --query and a single --candidate");
    }

    let query = hash_codes(media_type, query);
    let candidate = hash_codes(media_type, candidate);
    check_codes(media_type, &query).context("Query hash rejected")?;
    check_codes(media_type, &candidate).context("Candidate hash rejected")?;

    let similarity = score(media_type, &query, &candidate).context("Scoring failed")?;
    debug!(media_type = media_type.as_str(), score = ?similarity, "Scored");

    if json {
        return print_json(&json!({
            "mediaType": media_type.as_str(),
            "score": similarity,
            "comparable": similarity.is_some(),
        }));
    }

    match similarity {
        Some(s) => println!("{} {}", "Score:".dimmed(), format_score(s).bold()),
        None => println!(
            "{} {}",
            "Score:".dimmed(),
            "no comparable hash pair (candidate excluded)".yellow()
        ),
    }
    Ok(())
}
