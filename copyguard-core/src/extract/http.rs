//! HTTP media fetcher with retry, backoff and a body size cap.

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{CopyguardError, Result};

/// Default cap on a fetched media body (20 MiB).
pub const DEFAULT_MAX_MEDIA_BYTES: usize = 20 * 1024 * 1024;

/// Configuration for the media fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
    /// Largest body accepted, in bytes.
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
            max_bytes: DEFAULT_MAX_MEDIA_BYTES,
        }
    }
}

/// Fetches media bodies over HTTP(S).
pub struct MediaFetcher {
    client: Client,
    config: FetchConfig,
}

impl MediaFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                CopyguardError::ExtractionFailure(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Fetch the body at `url`, retrying transient failures with exponential backoff.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let backoff = self.build_backoff();

        retry_notify(
            backoff,
            || async move { self.fetch_once(url).await },
            |err: CopyguardError, duration: Duration| {
                warn!(
                    error = %err,
                    url,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn fetch_once(
        &self,
        url: &str,
    ) -> std::result::Result<Vec<u8>, backoff::Error<CopyguardError>> {
        let start = Instant::now();

        let mut response = self.client.get(url).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient fetch error, will retry");
                backoff::Error::transient(CopyguardError::ExtractionFailure(format!(
                    "Transient error fetching {url}: {e}"
                )))
            } else {
                warn!(error = %e, latency_ms, "Permanent fetch error, aborting");
                backoff::Error::permanent(CopyguardError::ExtractionFailure(format!(
                    "Request for {url} failed: {e}"
                )))
            }
        })?;

        let status = response.status();
        debug!(status = %status, url, "Received HTTP response");

        if !status.is_success() {
            let err = CopyguardError::ExtractionFailure(format!("{url} returned status: {status}"));
            return if is_transient_status(status) {
                warn!(status = %status, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        if let Some(length) = response.content_length() {
            if length > self.config.max_bytes as u64 {
                return Err(backoff::Error::permanent(too_large(url, length, self.config.max_bytes)));
            }
        }

        // Content-Length is optional, so the cap is enforced while streaming
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            backoff::Error::transient(CopyguardError::ExtractionFailure(format!(
                "Failed to read body of {url}: {e}"
            )))
        })? {
            let received = body.len() + chunk.len();
            if received > self.config.max_bytes {
                warn!(url, received, "Body exceeds size cap, aborting");
                return Err(backoff::Error::permanent(too_large(
                    url,
                    received as u64,
                    self.config.max_bytes,
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = body.len(),
            "Fetch completed successfully"
        );

        Ok(body)
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        }
    }
}

fn too_large(url: &str, length: u64, max: usize) -> CopyguardError {
    CopyguardError::ExtractionFailure(format!(
        "{url} body of at least {length} bytes exceeds limit of {max} bytes"
    ))
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a chunked 200 response of `chunks` × 1 KiB without a
    /// Content-Length header, returning the base URL.
    async fn chunked_server(chunks: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = [0u8; 1024];
                    let _ = socket.read(&mut request).await;
                    let head = "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\n\
                                Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
                    if socket.write_all(head.as_bytes()).await.is_err() {
                        return;
                    }
                    let chunk = vec![b'x'; 1024];
                    for _ in 0..chunks {
                        let framed = [b"400\r\n".as_slice(), &chunk, b"\r\n"].concat();
                        if socket.write_all(&framed).await.is_err() {
                            return;
                        }
                    }
                    let _ = socket.write_all(b"0\r\n\r\n").await;
                });
            }
        });
        format!("http://{addr}/media.png")
    }

    fn capped_config(max_bytes: usize) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(5),
            max_retries: 1,
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(20),
            max_bytes,
        }
    }

    #[test]
    fn test_transient_status_codes() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_default_config_caps_body() {
        let config = FetchConfig::default();
        assert_eq!(config.max_bytes, DEFAULT_MAX_MEDIA_BYTES);
        assert!(config.timeout > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_is_permanent_failure() {
        let fetcher = MediaFetcher::new(FetchConfig {
            max_retries: 1,
            ..Default::default()
        })
        .unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, CopyguardError::ExtractionFailure(_)));
    }

    #[tokio::test]
    async fn test_chunked_body_over_cap_is_rejected_while_streaming() {
        let url = chunked_server(1024).await;
        let fetcher = MediaFetcher::new(capped_config(4 * 1024)).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        match err {
            CopyguardError::ExtractionFailure(msg) => assert!(msg.contains("exceeds limit")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chunked_body_under_cap_is_returned() {
        let url = chunked_server(3).await;
        let fetcher = MediaFetcher::new(capped_config(4 * 1024)).unwrap();

        let body = fetcher.fetch(&url).await.unwrap();
        assert_eq!(body.len(), 3 * 1024);
    }
}
