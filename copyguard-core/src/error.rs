use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopyguardError {
    #[error("Extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Policy engine defect: {0}")]
    PolicyEngine(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, CopyguardError>;
