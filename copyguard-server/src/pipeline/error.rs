//! Scan pipeline errors and their retry classification.

use std::time::Duration;

use copyguard_core::CopyguardError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Content id {0} exists as both post and post meta")]
    AmbiguousContent(String),

    #[error("Persistence failure: {0}")]
    TransientPersistence(String),

    #[error("Policy engine defect: {0}")]
    PolicyEngine(String),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Scan lease for {0} is held by another scan")]
    LeaseBusy(String),

    #[error("Scan exceeded {0:?}")]
    Timeout(Duration),
}

impl ScanError {
    /// Whether a later attempt can succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ExtractionFailure(_)
            | Self::TransientPersistence(_)
            | Self::LeaseBusy(_)
            | Self::Timeout(_) => true,
            Self::NotFound(_)
            | Self::AmbiguousContent(_)
            | Self::PolicyEngine(_)
            | Self::InvalidHash(_) => false,
        }
    }

    /// Short category for logs and alerts.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ExtractionFailure(_) => "EXTRACTION_FAILURE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AmbiguousContent(_) => "AMBIGUOUS_CONTENT",
            Self::TransientPersistence(_) => "TRANSIENT_PERSISTENCE",
            Self::PolicyEngine(_) => "POLICY_ENGINE",
            Self::InvalidHash(_) => "INVALID_HASH",
            Self::LeaseBusy(_) => "LEASE_BUSY",
            Self::Timeout(_) => "TIMEOUT",
        }
    }
}

impl From<StoreError> for ScanError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::TransientPersistence(other.to_string()),
        }
    }
}

impl From<CopyguardError> for ScanError {
    fn from(e: CopyguardError) -> Self {
        match e {
            CopyguardError::InvalidHash(msg) => Self::InvalidHash(msg),
            CopyguardError::PolicyEngine(msg) => Self::PolicyEngine(msg),
            other => Self::ExtractionFailure(other.to_string()),
        }
    }
}
