//! Image extractor backed by HTTP fetching and blockhash.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::http::{FetchConfig, MediaFetcher};
use super::perceptual::PerceptualHasher;
use super::ImageExtractor;
use crate::error::{CopyguardError, Result};

/// Fetches every locator and hashes it with [`PerceptualHasher`].
///
/// Locators are processed sequentially; the first failure aborts the whole
/// extraction.
pub struct HttpImageExtractor {
    fetcher: MediaFetcher,
    hasher: PerceptualHasher,
}

impl HttpImageExtractor {
    pub fn new(config: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: MediaFetcher::new(config)?,
            hasher: PerceptualHasher,
        })
    }
}

#[async_trait]
impl ImageExtractor for HttpImageExtractor {
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    async fn extract(&self, urls: &[String]) -> Result<Vec<String>> {
        if urls.is_empty() {
            return Err(CopyguardError::ExtractionFailure(
                "no media locators to extract".into(),
            ));
        }

        let mut hashes = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            let bytes = self.fetcher.fetch(url).await.map_err(|e| {
                CopyguardError::ExtractionFailure(format!("locator {index} ({url}): {e}"))
            })?;

            let hasher = self.hasher;
            let hash = tokio::task::spawn_blocking(move || hasher.hash_bytes(&bytes))
                .await
                .map_err(|e| {
                    CopyguardError::ExtractionFailure(format!("hashing task failed: {e}"))
                })?
                .map_err(|e| {
                    CopyguardError::ExtractionFailure(format!("locator {index} ({url}): {e}"))
                })?;

            debug!(index, "Perceptual hash computed");
            hashes.push(hash);
        }

        Ok(hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_locators_fail() {
        let extractor = HttpImageExtractor::new(FetchConfig::default()).unwrap();
        let err = extractor.extract(&[]).await.unwrap_err();
        assert!(matches!(err, CopyguardError::ExtractionFailure(_)));
    }
}
