//! In-memory store backed by `DashMap`.
//!
//! Used when no database is configured and by the test suites. Each
//! per-content history is mutated under its map entry lock, so idempotent
//! appends are race-free within one process.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use copyguard_core::{
    ContentRef, Fingerprint, HashCodes, MatchRecord, MediaType, ModerationState, Policy,
    ReferenceAsset,
};
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    ContentRepository, FingerprintStore, MatchRecorder, NewMatch, NewReference, ReferenceIndex,
    StatusUpdate, StoreError,
};

/// In-memory storage for every persistence seam
#[derive(Default)]
pub struct MemoryStore {
    fingerprints: DashMap<ContentRef, Vec<Fingerprint>>,
    references: DashMap<Uuid, ReferenceAsset>,
    matches: DashMap<ContentRef, Vec<MatchRecord>>,
    contents: DashMap<ContentRef, ModerationState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a content document.
    pub fn insert_content(&self, content: ContentRef, state: ModerationState) {
        self.contents.insert(content, state);
    }

    /// Insert a reference asset as-is, keeping its id and timestamp.
    pub fn insert_reference(&self, reference: ReferenceAsset) {
        let mut reference = reference;
        reference.hashes = reference.hashes.deduplicated();
        self.references.insert(reference.id, reference);
    }
}

#[async_trait]
impl FingerprintStore for MemoryStore {
    async fn append(
        &self,
        content: &ContentRef,
        media_type: MediaType,
        hashes: &HashCodes,
        scan_id: Uuid,
    ) -> Result<Fingerprint, StoreError> {
        let mut history = self.fingerprints.entry(content.clone()).or_default();

        if let Some(existing) = history.iter().find(|f| f.scan_id == scan_id) {
            return Ok(existing.clone());
        }

        let fingerprint = Fingerprint {
            id: Uuid::new_v4(),
            content: content.clone(),
            media_type,
            hashes: hashes.normalized(),
            version: history.last().map_or(1, |f| f.version + 1),
            scan_id,
            created_at: Utc::now(),
        };
        history.push(fingerprint.clone());

        Ok(fingerprint)
    }

    async fn history(&self, content: &ContentRef) -> Result<Vec<Fingerprint>, StoreError> {
        Ok(self
            .fingerprints
            .get(content)
            .map(|h| h.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ReferenceIndex for MemoryStore {
    async fn create(&self, input: NewReference) -> Result<ReferenceAsset, StoreError> {
        let reference = ReferenceAsset {
            id: Uuid::new_v4(),
            owner_id: input.owner_id,
            media_type: input.media_type,
            hashes: input.hashes.deduplicated(),
            policy: input.policy,
            updated_at: Utc::now(),
        };
        self.references.insert(reference.id, reference.clone());
        Ok(reference)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ReferenceAsset>, StoreError> {
        Ok(self.references.get(&id).map(|r| r.value().clone()))
    }

    async fn candidates_for(
        &self,
        media_type: MediaType,
        hashes: &HashCodes,
    ) -> Result<Vec<ReferenceAsset>, StoreError> {
        let query = hashes.normalized();
        let query_phash: HashSet<&str> = query.phash.iter().map(String::as_str).collect();

        let mut candidates: Vec<ReferenceAsset> = self
            .references
            .iter()
            .filter(|r| r.media_type == media_type)
            .filter(|r| {
                if media_type.is_perceptual() {
                    r.hashes.phash.iter().any(|h| query_phash.contains(h.as_str()))
                } else {
                    query.simhash.is_some() && r.hashes.simhash == query.simhash
                }
            })
            .map(|r| r.value().clone())
            .collect();

        candidates.sort_by_key(|r| r.id);
        Ok(candidates)
    }

    async fn set_policy(&self, id: Uuid, policy: Policy) -> Result<ReferenceAsset, StoreError> {
        let mut reference = self
            .references
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("reference {id}")))?;
        reference.policy = policy;
        reference.updated_at = Utc::now();
        Ok(reference.clone())
    }

    async fn add_hashes(&self, id: Uuid, hashes: &HashCodes) -> Result<ReferenceAsset, StoreError> {
        let mut reference = self
            .references
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("reference {id}")))?;
        if reference.hashes.merge(hashes) {
            reference.updated_at = Utc::now();
        }
        Ok(reference.clone())
    }
}

#[async_trait]
impl MatchRecorder for MemoryStore {
    async fn record(&self, input: NewMatch) -> Result<MatchRecord, StoreError> {
        let mut records = self.matches.entry(input.content.clone()).or_default();

        if let Some(existing) = records.iter().find(|m| m.scan_id == input.scan_id) {
            return Ok(existing.clone());
        }

        let record = MatchRecord {
            id: Uuid::new_v4(),
            content: input.content,
            ref_asset_id: input.ref_asset_id,
            media_type: input.media_type,
            score: input.score,
            decision: input.decision,
            reason: input.reason,
            scan_id: input.scan_id,
            created_at: Utc::now(),
        };
        records.push(record.clone());

        Ok(record)
    }

    async fn for_content(&self, content: &ContentRef) -> Result<Vec<MatchRecord>, StoreError> {
        Ok(self
            .matches
            .get(content)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ContentRepository for MemoryStore {
    async fn find(&self, content: &ContentRef) -> Result<Option<ModerationState>, StoreError> {
        Ok(self.contents.get(content).map(|s| s.value().clone()))
    }

    async fn update_status(
        &self,
        content: &ContentRef,
        update: &StatusUpdate,
    ) -> Result<ModerationState, StoreError> {
        let mut state = self
            .contents
            .get_mut(content)
            .ok_or_else(|| StoreError::NotFound(format!("content {content}")))?;
        state.status = update.status;
        state.restriction_reason = update.restriction_reason.clone();
        if let Some(scan_status) = update.scan_status {
            state.copyright_scan_status = scan_status;
        }
        Ok(state.clone())
    }
}
