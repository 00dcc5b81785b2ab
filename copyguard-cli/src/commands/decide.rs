//! Decide command implementation.

use anyhow::Result;
use colored::{ColoredString, Colorize};
use copyguard_core::{decide, Decision, PolicyOutcome};
use serde_json::json;

use crate::utils::{parse_media_type, parse_policy, print_json};

pub fn paint(decision: Decision) -> ColoredString {
    match decision {
        Decision::Violation => decision.as_str().red().bold(),
        Decision::Review => decision.as_str().yellow().bold(),
        Decision::Allow => decision.as_str().green().bold(),
    }
}

/// Execute the decide command.
pub fn execute(media_type: String, score: f64, policy: String, json: bool) -> Result<()> {
    let media_type = parse_media_type(&media_type)?;
    let policy = parse_policy(&policy)?;

    let PolicyOutcome { decision, reason } = decide(media_type, score, policy)?;

    if json {
        return print_json(&json!({
            "mediaType": media_type.as_str(),
            "score": score,
            "policy": policy.as_str(),
            "decision": decision.as_str(),
            "reason": reason,
        }));
    }

    println!("{} {}", "Decision:".dimmed(), paint(decision));
    println!("{} {}", "Reason:".dimmed(), reason);
    Ok(())
}
