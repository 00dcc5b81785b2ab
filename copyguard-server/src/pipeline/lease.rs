//! Per-content scan leases.
//!
//! At most one scan of a given content runs at a time inside this process.
//! A lease expires after its TTL even if the holder never releases it.
//!
//! Leases are not shared between server instances. Several instances on one
//! Postgres queue can run scans of the same content concurrently; the
//! per-scan idempotence of fingerprints and matches still holds, but the
//! last state write wins. Run a single worker instance per database when
//! rescans must be strictly ordered.

use std::sync::Arc;
use std::time::Duration;

use copyguard_core::ContentRef;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

use super::ScanError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
struct Holder {
    token: Uuid,
    expires_at: Instant,
}

/// Table of active leases keyed by content reference.
#[derive(Debug, Clone)]
pub struct ScanLeases {
    held: Arc<DashMap<ContentRef, Holder>>,
    ttl: Duration,
}

impl ScanLeases {
    pub fn new(ttl: Duration) -> Self {
        Self {
            held: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Take the lease without waiting.
    pub fn try_acquire(&self, content: &ContentRef) -> Option<LeaseGuard> {
        let now = Instant::now();
        let token = Uuid::new_v4();
        let holder = Holder {
            token,
            expires_at: now + self.ttl,
        };

        match self.held.entry(content.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().expires_at > now {
                    return None;
                }
                tracing::warn!(content = %content, "Scan lease expired, taking over");
                existing.insert(holder);
            }
            Entry::Vacant(slot) => {
                slot.insert(holder);
            }
        }

        Some(LeaseGuard {
            held: self.held.clone(),
            content: content.clone(),
            token,
        })
    }

    /// Wait up to the TTL for the lease, then fail with `LeaseBusy`.
    pub async fn acquire(&self, content: &ContentRef) -> Result<LeaseGuard, ScanError> {
        self.acquire_within(content, self.ttl).await
    }

    /// Wait up to `wait` for the lease, then fail with `LeaseBusy`.
    pub async fn acquire_within(
        &self,
        content: &ContentRef,
        wait: Duration,
    ) -> Result<LeaseGuard, ScanError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(guard) = self.try_acquire(content) {
                return Ok(guard);
            }
            if Instant::now() >= deadline {
                return Err(ScanError::LeaseBusy(content.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub fn is_held(&self, content: &ContentRef) -> bool {
        self.held
            .get(content)
            .is_some_and(|h| h.expires_at > Instant::now())
    }
}

/// Releases the lease on drop, unless it was already taken over.
#[derive(Debug)]
pub struct LeaseGuard {
    held: Arc<DashMap<ContentRef, Holder>>,
    content: ContentRef,
    token: Uuid,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.held
            .remove_if(&self.content, |_, holder| holder.token == self.token);
    }
}
