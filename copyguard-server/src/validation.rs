//! Request validation module
//!
//! Provides validation utilities for enqueue and reference payloads.

use copyguard_core::{check_codes, HashCodes, MediaType};
use url::Url;

use crate::error::ApiError;

/// Allowed URL schemes for media locators
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Maximum media locators per scan
pub const MAX_LOCATORS: usize = 32;

/// Maximum text length in bytes (256 KB)
pub const MAX_TEXT_BYTES: usize = 256 * 1024;

/// Maximum content id length
const MAX_CONTENT_ID_LEN: usize = 128;

/// Validates a content id: non-empty, bounded, no whitespace
pub fn validate_content_id(id: &str) -> Result<(), ApiError> {
    if id.is_empty() {
        return Err(ApiError::bad_request("contentId must not be empty"));
    }
    if id.len() > MAX_CONTENT_ID_LEN {
        return Err(ApiError::bad_request(format!(
            "contentId exceeds {MAX_CONTENT_ID_LEN} characters"
        )));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(ApiError::bad_request("contentId must not contain whitespace"));
    }
    Ok(())
}

/// Parses a media type and rejects the ones that cannot be scanned yet
pub fn parse_scannable_media_type(raw: &str) -> Result<MediaType, ApiError> {
    let media_type: MediaType = raw
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Unsupported mediaType: '{raw}'")))?;

    match media_type {
        MediaType::Image | MediaType::Text => Ok(media_type),
        MediaType::Video | MediaType::Audio => Err(ApiError::bad_request(format!(
            "Scanning {media_type} content is not supported"
        ))),
    }
}

/// Validates image locators: at least one, bounded count, absolute http(s) URLs
pub fn validate_locators(urls: Option<&[String]>) -> Result<(), ApiError> {
    let urls = match urls {
        Some(urls) if !urls.is_empty() => urls,
        _ => {
            return Err(ApiError::bad_request(
                "Image scans require at least one url",
            ))
        }
    };

    if urls.len() > MAX_LOCATORS {
        return Err(ApiError::bad_request(format!(
            "Too many urls: {} exceeds maximum of {}",
            urls.len(),
            MAX_LOCATORS
        )));
    }

    for (index, raw) in urls.iter().enumerate() {
        let parsed = Url::parse(raw)
            .map_err(|e| ApiError::bad_request(format!("urls[{index}] is not a valid URL: {e}")))?;
        if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
            return Err(ApiError::bad_request(format!(
                "urls[{index}] has unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
    }

    Ok(())
}

/// Validates scan text: present and bounded
pub fn validate_text(text: Option<&str>) -> Result<(), ApiError> {
    match text {
        None => Err(ApiError::bad_request("Text scans require text")),
        Some(t) if t.len() > MAX_TEXT_BYTES => Err(ApiError::bad_request(format!(
            "Text too large: {} bytes exceeds maximum of {} bytes",
            t.len(),
            MAX_TEXT_BYTES
        ))),
        Some(_) => Ok(()),
    }
}

/// Validates reference hash codes against the media type's canonical lengths
pub fn validate_hashes(media_type: MediaType, hashes: &HashCodes) -> Result<(), ApiError> {
    if media_type.is_perceptual() && hashes.simhash.is_some() {
        return Err(ApiError::bad_request(format!(
            "simHash is not valid for {media_type} references"
        )));
    }
    if !media_type.is_perceptual() && !hashes.phash.is_empty() {
        return Err(ApiError::bad_request(
            "pHash is not valid for text references",
        ));
    }
    check_codes(media_type, hashes).map_err(|e| ApiError::bad_request(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_id() {
        assert!(validate_content_id("post-123").is_ok());
        assert!(validate_content_id("").is_err());
        assert!(validate_content_id("a b").is_err());
        assert!(validate_content_id(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_parse_scannable_media_type() {
        assert_eq!(parse_scannable_media_type("image").unwrap(), MediaType::Image);
        assert_eq!(parse_scannable_media_type("text").unwrap(), MediaType::Text);
        assert!(parse_scannable_media_type("video").is_err());
        assert!(parse_scannable_media_type("audio").is_err());
        assert!(parse_scannable_media_type("gif").is_err());
    }

    #[test]
    fn test_validate_locators() {
        let ok = vec!["https://cdn.example.com/a.jpg".to_string()];
        assert!(validate_locators(Some(&ok)).is_ok());

        assert!(validate_locators(None).is_err());
        assert!(validate_locators(Some(&[])).is_err());

        let relative = vec!["/a.jpg".to_string()];
        assert!(validate_locators(Some(&relative)).is_err());

        let ftp = vec!["ftp://example.com/a.jpg".to_string()];
        assert!(validate_locators(Some(&ftp)).is_err());

        let many = vec!["https://example.com/a.jpg".to_string(); MAX_LOCATORS + 1];
        assert!(validate_locators(Some(&many)).is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text(Some("caption")).is_ok());
        assert!(validate_text(Some("")).is_ok());
        assert!(validate_text(None).is_err());
        assert!(validate_text(Some(&"a".repeat(MAX_TEXT_BYTES + 1))).is_err());
    }

    #[test]
    fn test_validate_hashes() {
        let phash = HashCodes::perceptual(vec!["ab".repeat(32)]);
        assert!(validate_hashes(MediaType::Image, &phash).is_ok());
        assert!(validate_hashes(MediaType::Text, &phash).is_err());

        let short = HashCodes::perceptual(vec!["abcd".into()]);
        assert!(validate_hashes(MediaType::Image, &short).is_err());

        let simhash = HashCodes::text("0123456789abcdef".into());
        assert!(validate_hashes(MediaType::Text, &simhash).is_ok());
        assert!(validate_hashes(MediaType::Image, &simhash).is_err());

        assert!(validate_hashes(MediaType::Image, &HashCodes::default()).is_err());
    }
}
