//! Moderation state transitions for scanned content.

use std::sync::Arc;

use copyguard_core::{
    ContentKind, ContentRef, ContentStatus, Decision, ModerationState, ScanStatus,
};

use super::ScanError;
use crate::store::{ContentRepository, StatusUpdate};

/// Reason stored on content restricted after a violation.
pub const RESTRICTION_REASON: &str = "Restricted: matches a protected copyrighted work";

/// Applies scan results to posts and post metas.
#[derive(Clone)]
pub struct ContentStateUpdater {
    contents: Arc<dyn ContentRepository>,
}

impl ContentStateUpdater {
    pub fn new(contents: Arc<dyn ContentRepository>) -> Self {
        Self { contents }
    }

    /// Resolve an untagged id by probing both content shapes.
    pub async fn resolve(&self, id: &str) -> Result<ContentRef, ScanError> {
        let post = ContentRef::post(id);
        let meta = ContentRef::post_meta(id);

        let in_posts = self.contents.find(&post).await?.is_some();
        let in_metas = self.contents.find(&meta).await?.is_some();

        match (in_posts, in_metas) {
            (true, true) => Err(ScanError::AmbiguousContent(id.to_string())),
            (true, false) => Ok(post),
            (false, true) => Ok(meta),
            (false, false) => Err(ScanError::NotFound(format!("content {id}"))),
        }
    }

    /// Current state of `content`, or `NotFound`.
    pub async fn get(&self, content: &ContentRef) -> Result<ModerationState, ScanError> {
        self.contents
            .find(content)
            .await?
            .ok_or_else(|| ScanError::NotFound(format!("content {content}")))
    }

    /// Set status, restriction reason and optionally scan status on exactly
    /// the shape named by `content`.
    pub async fn update_status(
        &self,
        content: &ContentRef,
        status: ContentStatus,
        restriction_reason: Option<String>,
        scan_status: Option<ScanStatus>,
    ) -> Result<ModerationState, ScanError> {
        let update = StatusUpdate {
            status,
            restriction_reason,
            scan_status,
        };
        let state = self.contents.update_status(content, &update).await?;

        tracing::debug!(
            content = %content,
            status = status.as_str(),
            scan_status = state.copyright_scan_status.as_str(),
            "Content state updated"
        );

        Ok(state)
    }

    /// Apply the state a scan decision maps to.
    pub async fn apply(
        &self,
        content: &ContentRef,
        decision: Decision,
    ) -> Result<ModerationState, ScanError> {
        let (status, reason, scan_status) = transition_for(decision);
        self.update_status(content, status, reason, Some(scan_status))
            .await
    }
}

/// Target `(status, restriction reason, scan status)` for a decision.
pub fn transition_for(decision: Decision) -> (ContentStatus, Option<String>, ScanStatus) {
    match decision {
        Decision::Allow => (ContentStatus::Active, None, ScanStatus::Passed),
        Decision::Review => (ContentStatus::Active, None, ScanStatus::Pending),
        Decision::Violation => (
            ContentStatus::Restricted,
            Some(RESTRICTION_REASON.to_string()),
            ScanStatus::Failed,
        ),
    }
}

/// Parse an optional kind string, as accepted at the API boundary.
pub fn parse_kind(kind: Option<&str>) -> Result<Option<ContentKind>, copyguard_core::CopyguardError> {
    kind.map(str::parse).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn updater_with(store: Arc<MemoryStore>) -> ContentStateUpdater {
        ContentStateUpdater::new(store)
    }

    #[tokio::test]
    async fn test_resolve_probes_both_shapes() {
        let store = Arc::new(MemoryStore::new());
        store.insert_content(ContentRef::post("p"), ModerationState::default());
        store.insert_content(ContentRef::post_meta("m"), ModerationState::default());
        store.insert_content(ContentRef::post("both"), ModerationState::default());
        store.insert_content(ContentRef::post_meta("both"), ModerationState::default());
        let updater = updater_with(store);

        assert_eq!(updater.resolve("p").await.unwrap(), ContentRef::post("p"));
        assert_eq!(updater.resolve("m").await.unwrap(), ContentRef::post_meta("m"));
        assert!(matches!(
            updater.resolve("both").await,
            Err(ScanError::AmbiguousContent(_))
        ));
        assert!(matches!(
            updater.resolve("ghost").await,
            Err(ScanError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_every_decision_lands_in_a_consistent_state() {
        let store = Arc::new(MemoryStore::new());
        let content = ContentRef::post("p");
        store.insert_content(content.clone(), ModerationState::default());
        let updater = updater_with(store);

        for decision in [Decision::Allow, Decision::Review, Decision::Violation] {
            let state = updater.apply(&content, decision).await.unwrap();
            assert!(state.is_consistent(), "{decision:?} produced {state:?}");
        }

        let restricted = updater.get(&content).await.unwrap();
        assert_eq!(restricted.status, ContentStatus::Restricted);
        assert_eq!(restricted.restriction_reason.as_deref(), Some(RESTRICTION_REASON));
        assert_eq!(restricted.copyright_scan_status, ScanStatus::Failed);
    }

    #[tokio::test]
    async fn test_update_missing_content_is_not_found() {
        let updater = updater_with(Arc::new(MemoryStore::new()));
        let err = updater
            .apply(&ContentRef::post_meta("ghost"), Decision::Allow)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind(None).unwrap(), None);
        assert_eq!(parse_kind(Some("post-meta")).unwrap(), Some(ContentKind::PostMeta));
        assert!(parse_kind(Some("comment")).is_err());
    }
}
