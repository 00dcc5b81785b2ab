//! Persistence for fingerprints, reference assets, matches and content state.
//!
//! Each concern is an async trait so the pipeline can run against either
//! backend:
//! - **PostgreSQL** (production): durable, shared between server instances.
//! - **Memory** (development fallback): `DashMap`-backed, lost on restart.
//!
//! If `DATABASE_URL` is not set, [`Backend::connect`] falls back to memory.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use std::sync::Arc;

use async_trait::async_trait;
use copyguard_core::{
    ContentRef, ContentStatus, Decision, Fingerprint, HashCodes, MatchRecord, MediaType,
    ModerationState, Policy, ReferenceAsset, ScanStatus,
};
use uuid::Uuid;

use crate::config::Config;
use crate::queue::{MemoryQueue, PostgresQueue, ScanQueue};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection(e.to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Migration(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// DTO for registering a reference asset
#[derive(Debug, Clone)]
pub struct NewReference {
    pub owner_id: String,
    pub media_type: MediaType,
    pub hashes: HashCodes,
    pub policy: Policy,
}

/// DTO for recording a match
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub content: ContentRef,
    pub ref_asset_id: Uuid,
    pub media_type: MediaType,
    pub score: f64,
    pub decision: Decision,
    pub reason: String,
    pub scan_id: Uuid,
}

/// DTO for a moderation state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: ContentStatus,
    pub restriction_reason: Option<String>,
    /// Left unchanged when `None`
    pub scan_status: Option<ScanStatus>,
}

/// Append-only, versioned fingerprint history per content.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Append a fingerprint with `version = previous + 1`.
    ///
    /// Writing the same `(content, scan_id)` again returns the existing record.
    async fn append(
        &self,
        content: &ContentRef,
        media_type: MediaType,
        hashes: &HashCodes,
        scan_id: Uuid,
    ) -> Result<Fingerprint, StoreError>;

    /// Full history for a content, oldest first.
    async fn history(&self, content: &ContentRef) -> Result<Vec<Fingerprint>, StoreError>;
}

/// Protected reference assets and candidate lookup.
#[async_trait]
pub trait ReferenceIndex: Send + Sync {
    async fn create(&self, input: NewReference) -> Result<ReferenceAsset, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ReferenceAsset>, StoreError>;

    /// References of `media_type` sharing at least one exact code with `hashes`.
    async fn candidates_for(
        &self,
        media_type: MediaType,
        hashes: &HashCodes,
    ) -> Result<Vec<ReferenceAsset>, StoreError>;

    async fn set_policy(&self, id: Uuid, policy: Policy) -> Result<ReferenceAsset, StoreError>;

    /// Append new codes, deduplicated; bumps `updated_at` when anything changed.
    async fn add_hashes(&self, id: Uuid, hashes: &HashCodes) -> Result<ReferenceAsset, StoreError>;
}

/// Append-only audit log of chosen matches.
#[async_trait]
pub trait MatchRecorder: Send + Sync {
    /// Record a match; a second record for the same `(content, scan_id)` returns the first.
    async fn record(&self, input: NewMatch) -> Result<MatchRecord, StoreError>;

    /// Matches for a content, oldest first.
    async fn for_content(&self, content: &ContentRef) -> Result<Vec<MatchRecord>, StoreError>;
}

/// Moderation state of posts and post metas.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn find(&self, content: &ContentRef) -> Result<Option<ModerationState>, StoreError>;

    /// Apply `update` to exactly the shape named by `content`.
    ///
    /// Returns `StoreError::NotFound` when no such document exists.
    async fn update_status(
        &self,
        content: &ContentRef,
        update: &StatusUpdate,
    ) -> Result<ModerationState, StoreError>;
}

/// Bundle of the persistence seams used by the pipeline and handlers.
#[derive(Clone)]
pub struct Stores {
    pub fingerprints: Arc<dyn FingerprintStore>,
    pub references: Arc<dyn ReferenceIndex>,
    pub matches: Arc<dyn MatchRecorder>,
    pub contents: Arc<dyn ContentRepository>,
}

impl Stores {
    /// Every seam served by one in-memory store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            fingerprints: store.clone(),
            references: store.clone(),
            matches: store.clone(),
            contents: store,
        }
    }

    /// Every seam served by one PostgreSQL store.
    pub fn postgres(store: Arc<PostgresStore>) -> Self {
        Self {
            fingerprints: store.clone(),
            references: store.clone(),
            matches: store.clone(),
            contents: store,
        }
    }
}

/// Storage backend selected at startup
#[derive(Clone)]
pub enum Backend {
    /// PostgreSQL storage (production)
    Postgres(Arc<PostgresStore>),
    /// In-memory storage (development fallback)
    Memory(Arc<MemoryStore>),
}

impl Backend {
    /// Connect using `DATABASE_URL` from the config, falling back to memory.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        match &config.database_url {
            Some(url) => {
                tracing::info!("Using PostgreSQL storage");
                let store = PostgresStore::connect(url, config.database_max_connections).await?;
                Ok(Self::Postgres(Arc::new(store)))
            }
            None => Ok(Self::in_memory()),
        }
    }

    /// Create an in-memory backend (development only)
    pub fn in_memory() -> Self {
        tracing::warn!("DATABASE_URL not set, using in-memory storage - data will be lost on restart!");
        Self::Memory(Arc::new(MemoryStore::new()))
    }

    pub fn stores(&self) -> Stores {
        match self {
            Self::Postgres(pg) => Stores::postgres(pg.clone()),
            Self::Memory(mem) => Stores::memory(mem.clone()),
        }
    }

    /// Scan queue on the same backend
    pub fn queue(&self, config: &Config) -> Arc<dyn ScanQueue> {
        match self {
            Self::Postgres(pg) => Arc::new(PostgresQueue::new(
                pg.pool().clone(),
                config.visibility_timeout(),
            )),
            Self::Memory(_) => Arc::new(MemoryQueue::new(config.visibility_timeout())),
        }
    }

    /// Check if using persistent storage
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Postgres(_))
    }

    /// Check database health (always Ok for memory backend)
    pub async fn check_health(&self) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pg) => pg.check_health().await,
            Self::Memory(_) => Ok(()),
        }
    }
}
