//! Domain types shared by the scanning pipeline, the stores and the API.
//!
//! Every enum here has a stable lowercase wire form (`as_str` / `FromStr`)
//! which is also the form persisted in text columns.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CopyguardError;

/// Kind of media a fingerprint or reference asset describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Text,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Text => "text",
        }
    }

    /// Image, video and audio are compared with perceptual hashes; text with simHash.
    pub fn is_perceptual(&self) -> bool {
        !matches!(self, MediaType::Text)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = CopyguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            "text" => Ok(MediaType::Text),
            other => Err(CopyguardError::UnsupportedMediaType(other.to_string())),
        }
    }
}

/// Hash codes extracted from one piece of content or registered for a reference.
///
/// Perceptual hashes keep their extraction order (one per media locator).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCodes {
    #[serde(rename = "pHash", default, skip_serializing_if = "Vec::is_empty")]
    pub phash: Vec<String>,
    #[serde(rename = "simHash", default, skip_serializing_if = "Option::is_none")]
    pub simhash: Option<String>,
}

impl HashCodes {
    pub fn perceptual(hashes: Vec<String>) -> Self {
        Self {
            phash: hashes,
            simhash: None,
        }
    }

    pub fn text(hash: String) -> Self {
        Self {
            phash: Vec::new(),
            simhash: Some(hash),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phash.is_empty() && self.simhash.is_none()
    }

    /// Lowercase and trim every code, keeping order and repeats.
    ///
    /// Fingerprints hold one perceptual hash per media locator, so two
    /// identical images stay two entries.
    pub fn normalized(&self) -> Self {
        Self {
            phash: self.phash.iter().map(|h| normalize_hex(h)).collect(),
            simhash: self.simhash.as_deref().map(normalize_hex),
        }
    }

    /// Like [`HashCodes::normalized`], also dropping repeated perceptual
    /// hashes. Reference hash sets are sets.
    pub fn deduplicated(&self) -> Self {
        let mut seen = HashSet::new();
        let mut codes = self.normalized();
        codes.phash.retain(|h| seen.insert(h.clone()));
        codes
    }

    /// Append codes from `other` that are not already present.
    ///
    /// Returns `true` when anything changed.
    pub fn merge(&mut self, other: &HashCodes) -> bool {
        let other = other.deduplicated();
        let mut changed = false;
        for hash in other.phash {
            if !self.phash.contains(&hash) {
                self.phash.push(hash);
                changed = true;
            }
        }
        if let Some(sim) = other.simhash {
            if self.simhash.as_ref() != Some(&sim) {
                self.simhash = Some(sim);
                changed = true;
            }
        }
        changed
    }

    /// Codes used for comparisons of the given media type.
    pub fn codes_for(&self, media_type: MediaType) -> Vec<&str> {
        if media_type.is_perceptual() {
            self.phash.iter().map(String::as_str).collect()
        } else {
            self.simhash.iter().map(String::as_str).collect()
        }
    }
}

/// Canonical form of a hex code: trimmed, lowercase.
pub fn normalize_hex(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

/// Which content shape a scan targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    PostMeta,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::PostMeta => "post_meta",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = CopyguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(ContentKind::Post),
            "post_meta" | "post-meta" => Ok(ContentKind::PostMeta),
            other => Err(CopyguardError::InvalidValue(format!(
                "unknown content kind: {other}"
            ))),
        }
    }
}

/// Tagged reference to a content document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: String,
}

impl ContentRef {
    pub fn new(kind: ContentKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn post(id: impl Into<String>) -> Self {
        Self::new(ContentKind::Post, id)
    }

    pub fn post_meta(id: impl Into<String>) -> Self {
        Self::new(ContentKind::PostMeta, id)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Visibility status of a content document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Active,
    Restricted,
    Blocked,
    Deleted,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Active => "active",
            ContentStatus::Restricted => "restricted",
            ContentStatus::Blocked => "blocked",
            ContentStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for ContentStatus {
    type Err = CopyguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ContentStatus::Active),
            "restricted" => Ok(ContentStatus::Restricted),
            "blocked" => Ok(ContentStatus::Blocked),
            "deleted" => Ok(ContentStatus::Deleted),
            other => Err(CopyguardError::InvalidValue(format!(
                "unknown content status: {other}"
            ))),
        }
    }
}

/// Copyright scan status of a content document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    #[default]
    Pending,
    Passed,
    Failed,
    Disputed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Passed => "passed",
            ScanStatus::Failed => "failed",
            ScanStatus::Disputed => "disputed",
        }
    }
}

impl FromStr for ScanStatus {
    type Err = CopyguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "passed" => Ok(ScanStatus::Passed),
            "failed" => Ok(ScanStatus::Failed),
            "disputed" => Ok(ScanStatus::Disputed),
            other => Err(CopyguardError::InvalidValue(format!(
                "unknown scan status: {other}"
            ))),
        }
    }
}

/// Moderation state of a content document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationState {
    pub status: ContentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restriction_reason: Option<String>,
    pub copyright_scan_status: ScanStatus,
}

impl ModerationState {
    /// `failed` requires restricted or blocked content; `passed` requires active content.
    pub fn is_consistent(&self) -> bool {
        match self.copyright_scan_status {
            ScanStatus::Failed => matches!(
                self.status,
                ContentStatus::Restricted | ContentStatus::Blocked
            ),
            ScanStatus::Passed => self.status == ContentStatus::Active,
            ScanStatus::Pending | ScanStatus::Disputed => true,
        }
    }
}

/// Owner-defined policy attached to a reference asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    Block,
    Track,
    Allow,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Block => "block",
            Policy::Track => "track",
            Policy::Allow => "allow",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = CopyguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(Policy::Block),
            "track" => Ok(Policy::Track),
            "allow" => Ok(Policy::Allow),
            other => Err(CopyguardError::InvalidValue(format!(
                "unknown policy: {other}"
            ))),
        }
    }
}

/// Outcome of the policy engine, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Review,
    Violation,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Review => "review",
            Decision::Violation => "violation",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = CopyguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Decision::Allow),
            "review" => Ok(Decision::Review),
            "violation" => Ok(Decision::Violation),
            other => Err(CopyguardError::InvalidValue(format!(
                "unknown decision: {other}"
            ))),
        }
    }
}

/// Versioned hash set extracted from one piece of content by one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
    pub id: Uuid,
    pub content: ContentRef,
    pub media_type: MediaType,
    pub hashes: HashCodes,
    pub version: i64,
    pub scan_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Protected work registered by a rights holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceAsset {
    pub id: Uuid,
    pub owner_id: String,
    pub media_type: MediaType,
    pub hashes: HashCodes,
    pub policy: Policy,
    pub updated_at: DateTime<Utc>,
}

/// Audit record of the best candidate chosen by one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: Uuid,
    pub content: ContentRef,
    pub ref_asset_id: Uuid,
    pub media_type: MediaType,
    pub score: f64,
    pub decision: Decision,
    pub reason: String,
    pub scan_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_roundtrip_wire_form() {
        for mt in [
            MediaType::Image,
            MediaType::Video,
            MediaType::Audio,
            MediaType::Text,
        ] {
            assert_eq!(mt.as_str().parse::<MediaType>().unwrap(), mt);
        }
        assert!("gif".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_hash_codes_normalized_keeps_repeats() {
        let codes = HashCodes::perceptual(vec!["ABCD".into(), "00ff".into(), " abcd ".into()]);
        let normalized = codes.normalized();
        assert_eq!(
            normalized.phash,
            vec!["abcd".to_string(), "00ff".to_string(), "abcd".to_string()]
        );
    }

    #[test]
    fn test_hash_codes_deduplicated_drops_repeats() {
        let codes = HashCodes::perceptual(vec!["ABCD".into(), " abcd ".into(), "00FF".into()]);
        let deduplicated = codes.deduplicated();
        assert_eq!(deduplicated.phash, vec!["abcd".to_string(), "00ff".to_string()]);
    }

    #[test]
    fn test_hash_codes_merge_reports_change() {
        let mut codes = HashCodes::perceptual(vec!["aa".into()]);
        assert!(!codes.merge(&HashCodes::perceptual(vec!["AA".into()])));
        assert!(codes.merge(&HashCodes::perceptual(vec!["bb".into()])));
        assert_eq!(codes.phash, vec!["aa".to_string(), "bb".to_string()]);
    }

    #[test]
    fn test_hash_codes_serde_names() {
        let codes = HashCodes::text("00ff".into());
        let json = serde_json::to_value(&codes).unwrap();
        assert_eq!(json, serde_json::json!({ "simHash": "00ff" }));
    }

    #[test]
    fn test_moderation_state_invariants() {
        let failed_active = ModerationState {
            status: ContentStatus::Active,
            restriction_reason: None,
            copyright_scan_status: ScanStatus::Failed,
        };
        assert!(!failed_active.is_consistent());

        let passed_restricted = ModerationState {
            status: ContentStatus::Restricted,
            restriction_reason: Some("x".into()),
            copyright_scan_status: ScanStatus::Passed,
        };
        assert!(!passed_restricted.is_consistent());

        assert!(ModerationState::default().is_consistent());
    }

    #[test]
    fn test_decision_ordering() {
        assert!(Decision::Allow < Decision::Review);
        assert!(Decision::Review < Decision::Violation);
    }

    #[test]
    fn test_content_ref_display() {
        assert_eq!(ContentRef::post_meta("42").to_string(), "post_meta:42");
        assert_eq!("post-meta".parse::<ContentKind>().unwrap(), ContentKind::PostMeta);
    }
}
