//! Enforcement orchestrator.
//!
//! Runs one scan job end to end:
//!
//! ```text
//! queued → extracting → retrieving-candidates → scoring → deciding
//!        → recording → updating-state → notifying → done
//! ```
//!
//! Any step may end the run in `failed`. Fingerprint and match writes are
//! keyed by the scan id and state writes are absolute, so running the same
//! job again converges on the same result.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use copyguard_core::{
    check_codes, decide, no_candidates, score_candidates, select_best, ContentRef, Decision,
    HashCodes, ImageExtractor, MatchRecord, ModerationState, PolicyOutcome, TextExtractor,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{ContentStateUpdater, ScanError, ScanLeases};
use crate::notify::{NotificationPublisher, OwnerNotification};
use crate::queue::ScanJob;
use crate::store::{NewMatch, Stores};

/// Step of a scan run, as logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Queued,
    Extracting,
    RetrievingCandidates,
    Scoring,
    Deciding,
    Recording,
    UpdatingState,
    Notifying,
    Done,
    Failed,
}

impl ScanStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Extracting => "extracting",
            Self::RetrievingCandidates => "retrieving-candidates",
            Self::Scoring => "scoring",
            Self::Deciding => "deciding",
            Self::Recording => "recording",
            Self::UpdatingState => "updating-state",
            Self::Notifying => "notifying",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a completed scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub scan_id: Uuid,
    pub content: ContentRef,
    pub decision: Decision,
    pub reason: String,
    /// Match written by this scan; `None` when no candidate was comparable.
    pub best_match: Option<MatchRecord>,
    pub fingerprint_version: i64,
    pub state: ModerationState,
}

pub struct Orchestrator {
    stores: Stores,
    images: Arc<dyn ImageExtractor>,
    text: Arc<dyn TextExtractor>,
    content_state: ContentStateUpdater,
    leases: ScanLeases,
    notifications: NotificationPublisher,
}

fn enter(scan_id: Uuid, content: &ContentRef, stage: ScanStage) {
    tracing::debug!(scan_id = %scan_id, content = %content, stage = stage.as_str(), "Scan stage");
}

impl Orchestrator {
    pub fn new(
        stores: Stores,
        images: Arc<dyn ImageExtractor>,
        text: Arc<dyn TextExtractor>,
        leases: ScanLeases,
        notifications: NotificationPublisher,
    ) -> Self {
        let content_state = ContentStateUpdater::new(stores.contents.clone());
        Self {
            stores,
            images,
            text,
            content_state,
            leases,
            notifications,
        }
    }

    pub fn content_state(&self) -> &ContentStateUpdater {
        &self.content_state
    }

    /// Run `job` under the content's lease.
    #[instrument(skip(self, job), fields(content = %job.content()))]
    pub async fn run(&self, scan_id: Uuid, job: &ScanJob) -> Result<ScanOutcome, ScanError> {
        let content = job.content();
        let start = Instant::now();

        enter(scan_id, content, ScanStage::Queued);
        let _lease = self.leases.acquire(content).await?;

        let result = self.run_leased(scan_id, job).await;

        let latency_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(outcome) => info!(
                scan_id = %scan_id,
                stage = ScanStage::Done.as_str(),
                decision = outcome.decision.as_str(),
                reason = %outcome.reason,
                latency_ms,
                "Scan completed"
            ),
            Err(e) => warn!(
                scan_id = %scan_id,
                stage = ScanStage::Failed.as_str(),
                error = %e,
                code = e.code(),
                latency_ms,
                "Scan failed"
            ),
        }

        result
    }

    async fn run_leased(&self, scan_id: Uuid, job: &ScanJob) -> Result<ScanOutcome, ScanError> {
        let content = job.content();
        let media_type = job.media_type();

        // NotFound is permanent; checked before anything is written.
        self.content_state.get(content).await?;

        enter(scan_id, content, ScanStage::Extracting);
        let hashes = self.extract(job).await?;
        check_codes(media_type, &hashes)?;

        let fingerprint = self
            .stores
            .fingerprints
            .append(content, media_type, &hashes, scan_id)
            .await?;

        enter(scan_id, content, ScanStage::RetrievingCandidates);
        let candidates = self
            .stores
            .references
            .candidates_for(media_type, &fingerprint.hashes)
            .await?;

        enter(scan_id, content, ScanStage::Scoring);
        let best = select_best(score_candidates(
            media_type,
            &fingerprint.hashes,
            candidates,
        )?);

        let Some(best) = best else {
            let outcome = no_candidates();
            enter(scan_id, content, ScanStage::UpdatingState);
            let state = self.content_state.apply(content, outcome.decision).await?;
            return Ok(ScanOutcome {
                scan_id,
                content: content.clone(),
                decision: outcome.decision,
                reason: outcome.reason,
                best_match: None,
                fingerprint_version: fingerprint.version,
                state,
            });
        };

        enter(scan_id, content, ScanStage::Deciding);
        // Policy may have changed since retrieval.
        let policy = self
            .stores
            .references
            .get(best.reference.id)
            .await?
            .map_or(best.reference.policy, |r| r.policy);
        let PolicyOutcome { decision, reason } = decide(media_type, best.score, policy)?;

        enter(scan_id, content, ScanStage::Recording);
        let record = self
            .stores
            .matches
            .record(NewMatch {
                content: content.clone(),
                ref_asset_id: best.reference.id,
                media_type,
                score: best.score,
                decision,
                reason,
                scan_id,
            })
            .await?;

        // A retried scan gets back the match written by its earlier attempt;
        // the persisted decision drives the state so both agree.
        let decision = record.decision;
        let reason = record.reason.clone();

        enter(scan_id, content, ScanStage::UpdatingState);
        let state = self.content_state.apply(content, decision).await?;

        if decision == Decision::Violation {
            enter(scan_id, content, ScanStage::Notifying);
            self.notifications
                .publish(OwnerNotification::copyright_violation(content, scan_id));
        }

        Ok(ScanOutcome {
            scan_id,
            content: content.clone(),
            decision,
            reason,
            best_match: Some(record),
            fingerprint_version: fingerprint.version,
            state,
        })
    }

    async fn extract(&self, job: &ScanJob) -> Result<HashCodes, ScanError> {
        match job {
            ScanJob::Image { urls, .. } => {
                let phashes = self.images.extract(urls).await?;
                if phashes.len() != urls.len() {
                    return Err(ScanError::ExtractionFailure(format!(
                        "extractor returned {} hashes for {} locators",
                        phashes.len(),
                        urls.len()
                    )));
                }
                Ok(HashCodes::perceptual(phashes))
            }
            ScanJob::Text { text, .. } => Ok(HashCodes::text(self.text.extract(text).await?)),
        }
    }
}
