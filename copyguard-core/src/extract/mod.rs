//! Fingerprint extraction.
//!
//! Extractors turn content into hash codes with a fixed output contract:
//!
//! - **Image**: one 256-bit perceptual hash (64 lowercase hex chars) per media
//!   locator, in input order. Any failure fails the whole extraction.
//! - **Text**: one 64-bit simHash (16 lowercase hex chars).
//!
//! Both are idempotent: identical input yields identical output.
//!
//! ## Quick Start
//!
//! ```no_run
//! use copyguard_core::extract::{HttpImageExtractor, ImageExtractor, SimHasher, TextExtractor};
//!
//! # async fn example() -> copyguard_core::Result<()> {
//! let images = HttpImageExtractor::new(Default::default())?;
//! let phashes = images.extract(&["https://cdn.example.com/a.jpg".to_string()]).await?;
//!
//! let simhash = SimHasher.extract("Some caption text").await?;
//! # Ok(())
//! # }
//! ```

#[cfg(all(feature = "network", feature = "perceptual-hash"))]
mod http;
#[cfg(all(feature = "network", feature = "perceptual-hash"))]
mod image;
mod mock;
#[cfg(feature = "perceptual-hash")]
mod perceptual;
mod text;

#[cfg(all(feature = "network", feature = "perceptual-hash"))]
pub use self::http::{is_transient_error, is_transient_status, FetchConfig, MediaFetcher};
#[cfg(all(feature = "network", feature = "perceptual-hash"))]
pub use self::image::HttpImageExtractor;
pub use mock::MockImageExtractor;
#[cfg(feature = "perceptual-hash")]
pub use perceptual::{PerceptualHasher, NORMALIZED_SIZE};
pub use text::{simhash, SimHasher};

use async_trait::async_trait;

use crate::error::Result;

/// Extracts perceptual hashes from remote images.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait ImageExtractor: Send + Sync {
    /// Return one hex-encoded perceptual hash per locator, in order.
    ///
    /// Fails with [`CopyguardError::ExtractionFailure`](crate::CopyguardError::ExtractionFailure)
    /// if any locator cannot be fetched or decoded. Partial results are never returned.
    async fn extract(&self, urls: &[String]) -> Result<Vec<String>>;
}

/// Extracts a simHash from text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<String>;
}
