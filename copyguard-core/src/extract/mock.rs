//! Mock image extractor for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::ImageExtractor;
use crate::error::{CopyguardError, Result};

/// Image extractor returning pre-registered hashes per locator.
///
/// Unknown locators fail the whole extraction, which lets tests simulate a
/// broken media URL in the middle of a job.
/// WARNING: Do not use in production.
#[derive(Debug, Default)]
pub struct MockImageExtractor {
    hashes: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MockImageExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the hash returned for `url`.
    pub fn with_hash(mut self, url: impl Into<String>, hash: impl Into<String>) -> Self {
        self.hashes.insert(url.into(), hash.into());
        self
    }

    /// Number of times `extract` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageExtractor for MockImageExtractor {
    async fn extract(&self, urls: &[String]) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if urls.is_empty() {
            return Err(CopyguardError::ExtractionFailure(
                "no media locators to extract".into(),
            ));
        }

        urls.iter()
            .enumerate()
            .map(|(index, url)| {
                self.hashes.get(url).cloned().ok_or_else(|| {
                    CopyguardError::ExtractionFailure(format!(
                        "locator {index} ({url}): fetch failed"
                    ))
                })
            })
            .collect()
    }
}
