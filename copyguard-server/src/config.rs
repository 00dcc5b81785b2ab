//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::time::Duration;

use copyguard_core::FetchConfig;

use crate::queue::RetryPolicy;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// PostgreSQL connection string; in-memory backends when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Request body limit in MB (default: 2)
    pub body_limit_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Number of concurrent scan workers (default: 4)
    pub worker_concurrency: usize,
    /// Attempts per scan job before dead-lettering (default: 3)
    pub scan_max_attempts: u32,
    /// Base retry delay in milliseconds (default: 1000)
    pub scan_base_delay_ms: u64,
    /// Retry delay cap in milliseconds (default: 60000)
    pub scan_max_delay_ms: u64,
    /// Idle queue polling interval in milliseconds (default: 500)
    pub scan_poll_interval_ms: u64,
    /// Seconds a claimed job stays invisible before redelivery (default: 300)
    pub scan_visibility_timeout_secs: u64,
    /// Per-content scan lease TTL in seconds (default: 120)
    pub scan_lease_ttl_secs: u64,
    /// Upper bound on a single scan run in seconds (default: 120)
    pub scan_job_timeout_secs: u64,
    /// Media fetch timeout in seconds (default: 10)
    pub fetch_timeout_secs: u64,
    /// Largest media body fetched, in bytes (default: 20 MiB)
    pub max_media_bytes: usize,
    /// Owner notification webhook; notifications are logged when unset
    pub notify_webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            database_url: None,
            database_max_connections: 20,
            body_limit_mb: 2,
            timeout_secs: 30,
            worker_concurrency: 4,
            scan_max_attempts: 3,
            scan_base_delay_ms: 1000,
            scan_max_delay_ms: 60_000,
            scan_poll_interval_ms: 500,
            scan_visibility_timeout_secs: 300,
            scan_lease_ttl_secs: 120,
            scan_job_timeout_secs: 120,
            fetch_timeout_secs: 10,
            max_media_bytes: 20 * 1024 * 1024,
            notify_webhook_url: None,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        Self {
            port: env_or("PORT", defaults.port),
            host,
            database_url: env_opt("DATABASE_URL"),
            database_max_connections: env_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            body_limit_mb: env_or("BODY_LIMIT_MB", defaults.body_limit_mb),
            timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            worker_concurrency: env_or("WORKER_CONCURRENCY", defaults.worker_concurrency).max(1),
            scan_max_attempts: env_or("SCAN_MAX_ATTEMPTS", defaults.scan_max_attempts).max(1),
            scan_base_delay_ms: env_or("SCAN_BASE_DELAY_MS", defaults.scan_base_delay_ms),
            scan_max_delay_ms: env_or("SCAN_MAX_DELAY_MS", defaults.scan_max_delay_ms),
            scan_poll_interval_ms: env_or("SCAN_POLL_INTERVAL_MS", defaults.scan_poll_interval_ms),
            scan_visibility_timeout_secs: env_or(
                "SCAN_VISIBILITY_TIMEOUT_SECS",
                defaults.scan_visibility_timeout_secs,
            ),
            scan_lease_ttl_secs: env_or("SCAN_LEASE_TTL_SECS", defaults.scan_lease_ttl_secs),
            scan_job_timeout_secs: env_or("SCAN_JOB_TIMEOUT_SECS", defaults.scan_job_timeout_secs),
            fetch_timeout_secs: env_or("FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs),
            max_media_bytes: env_or("MAX_MEDIA_BYTES", defaults.max_media_bytes),
            notify_webhook_url: env_opt("NOTIFY_WEBHOOK_URL"),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Retry schedule for scan jobs
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.scan_max_attempts,
            base_delay: Duration::from_millis(self.scan_base_delay_ms),
            max_delay: Duration::from_millis(self.scan_max_delay_ms),
        }
    }

    /// Media fetcher settings for the image extractor
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_bytes: self.max_media_bytes,
            ..FetchConfig::default()
        }
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.scan_lease_ttl_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_job_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.scan_poll_interval_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_visibility_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, [127, 0, 0, 1]);
        assert_eq!(config.scan_max_attempts, 3);
        assert!(config.database_url.is_none());
        assert!(config.notify_webhook_url.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::default();
        let addr = config.socket_addr();
        assert_eq!(addr.port(), 3000);
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = Config {
            scan_base_delay_ms: 10,
            scan_max_delay_ms: 25,
            ..Config::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(3), Duration::from_millis(25));
    }

    #[test]
    fn test_fetch_config_carries_limits() {
        let config = Config {
            fetch_timeout_secs: 3,
            max_media_bytes: 1024,
            ..Config::default()
        };
        let fetch = config.fetch_config();
        assert_eq!(fetch.timeout, Duration::from_secs(3));
        assert_eq!(fetch.max_bytes, 1024);
    }
}
