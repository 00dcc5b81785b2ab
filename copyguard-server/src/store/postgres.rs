//! PostgreSQL implementation of the stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copyguard_core::{
    ContentKind, ContentRef, Fingerprint, HashCodes, MatchRecord, MediaType, ModerationState,
    Policy, ReferenceAsset,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    ContentRepository, FingerprintStore, MatchRecorder, NewMatch, NewReference, ReferenceIndex,
    StatusUpdate, StoreError,
};

/// PostgreSQL-backed store for every persistence seam.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

fn parse<T: std::str::FromStr>(value: &str, what: &str) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|_| StoreError::Serialization(format!("invalid {what} in row: {value}")))
}

fn content_table(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Post => "posts",
        ContentKind::PostMeta => "post_metas",
    }
}

/// Row type for fingerprint queries.
#[derive(FromRow)]
struct FingerprintRow {
    id: Uuid,
    content_kind: String,
    content_id: String,
    media_type: String,
    phash: Vec<String>,
    simhash: Option<String>,
    version: i64,
    scan_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<FingerprintRow> for Fingerprint {
    type Error = StoreError;

    fn try_from(row: FingerprintRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            content: ContentRef::new(parse(&row.content_kind, "content kind")?, row.content_id),
            media_type: parse(&row.media_type, "media type")?,
            hashes: HashCodes {
                phash: row.phash,
                simhash: row.simhash,
            },
            version: row.version,
            scan_id: row.scan_id,
            created_at: row.created_at,
        })
    }
}

/// Row type for reference asset queries.
#[derive(FromRow)]
struct ReferenceRow {
    id: Uuid,
    owner_id: String,
    media_type: String,
    phash: Vec<String>,
    simhash: Option<String>,
    policy: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReferenceRow> for ReferenceAsset {
    type Error = StoreError;

    fn try_from(row: ReferenceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            media_type: parse(&row.media_type, "media type")?,
            hashes: HashCodes {
                phash: row.phash,
                simhash: row.simhash,
            },
            policy: parse(&row.policy, "policy")?,
            updated_at: row.updated_at,
        })
    }
}

/// Row type for match queries.
#[derive(FromRow)]
struct MatchRow {
    id: Uuid,
    content_kind: String,
    content_id: String,
    ref_asset_id: Uuid,
    media_type: String,
    score: f64,
    decision: String,
    reason: String,
    scan_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for MatchRecord {
    type Error = StoreError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            content: ContentRef::new(parse(&row.content_kind, "content kind")?, row.content_id),
            ref_asset_id: row.ref_asset_id,
            media_type: parse(&row.media_type, "media type")?,
            score: row.score,
            decision: parse(&row.decision, "decision")?,
            reason: row.reason,
            scan_id: row.scan_id,
            created_at: row.created_at,
        })
    }
}

/// Row type for moderation state queries.
#[derive(FromRow)]
struct ModerationRow {
    status: String,
    restriction_reason: Option<String>,
    copyright_scan_status: String,
}

impl TryFrom<ModerationRow> for ModerationState {
    type Error = StoreError;

    fn try_from(row: ModerationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: parse(&row.status, "content status")?,
            restriction_reason: row.restriction_reason,
            copyright_scan_status: parse(&row.copyright_scan_status, "scan status")?,
        })
    }
}

const FINGERPRINT_COLUMNS: &str =
    "id, content_kind, content_id, media_type, phash, simhash, version, scan_id, created_at";
const REFERENCE_COLUMNS: &str = "id, owner_id, media_type, phash, simhash, policy, updated_at";
const MATCH_COLUMNS: &str = "id, content_kind, content_id, ref_asset_id, media_type, score, decision, reason, scan_id, created_at";

impl PostgresStore {
    /// Connect to the database and run migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Store connected and migrations applied");

        Ok(Self { pool })
    }

    /// Create a store from an existing pool (for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn check_health(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn fingerprint_by_scan(
        &self,
        content: &ContentRef,
        scan_id: Uuid,
    ) -> Result<Option<Fingerprint>, StoreError> {
        let row: Option<FingerprintRow> = sqlx::query_as(&format!(
            "SELECT {FINGERPRINT_COLUMNS} FROM fingerprints \
             WHERE content_kind = $1 AND content_id = $2 AND scan_id = $3"
        ))
        .bind(content.kind.as_str())
        .bind(&content.id)
        .bind(scan_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn match_by_scan(
        &self,
        content: &ContentRef,
        scan_id: Uuid,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let row: Option<MatchRow> = sqlx::query_as(&format!(
            "SELECT {MATCH_COLUMNS} FROM content_matches \
             WHERE content_kind = $1 AND content_id = $2 AND scan_id = $3"
        ))
        .bind(content.kind.as_str())
        .bind(&content.id)
        .bind(scan_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[async_trait]
impl FingerprintStore for PostgresStore {
    async fn append(
        &self,
        content: &ContentRef,
        media_type: MediaType,
        hashes: &HashCodes,
        scan_id: Uuid,
    ) -> Result<Fingerprint, StoreError> {
        let hashes = hashes.normalized();

        let inserted: Option<FingerprintRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO fingerprints
                (id, content_kind, content_id, media_type, phash, simhash, version, scan_id)
            SELECT $1, $2, $3, $4, $5, $6,
                COALESCE(MAX(version), 0) + 1, $7
            FROM fingerprints
            WHERE content_kind = $2 AND content_id = $3
            ON CONFLICT DO NOTHING
            RETURNING {FINGERPRINT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(content.kind.as_str())
        .bind(&content.id)
        .bind(media_type.as_str())
        .bind(&hashes.phash)
        .bind(&hashes.simhash)
        .bind(scan_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            tracing::debug!(content = %content, scan_id = %scan_id, "Stored fingerprint");
            return row.try_into();
        }

        // Conflict: either this scan already wrote, or a concurrent scan took the version.
        self.fingerprint_by_scan(content, scan_id)
            .await?
            .ok_or_else(|| {
                StoreError::Query(format!("concurrent fingerprint append for {content}"))
            })
    }

    async fn history(&self, content: &ContentRef) -> Result<Vec<Fingerprint>, StoreError> {
        let rows: Vec<FingerprintRow> = sqlx::query_as(&format!(
            "SELECT {FINGERPRINT_COLUMNS} FROM fingerprints \
             WHERE content_kind = $1 AND content_id = $2 ORDER BY version ASC"
        ))
        .bind(content.kind.as_str())
        .bind(&content.id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl ReferenceIndex for PostgresStore {
    async fn create(&self, input: NewReference) -> Result<ReferenceAsset, StoreError> {
        let hashes = input.hashes.deduplicated();

        let row: ReferenceRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO reference_assets (id, owner_id, media_type, phash, simhash, policy)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REFERENCE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.owner_id)
        .bind(input.media_type.as_str())
        .bind(&hashes.phash)
        .bind(&hashes.simhash)
        .bind(input.policy.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get(&self, id: Uuid) -> Result<Option<ReferenceAsset>, StoreError> {
        let row: Option<ReferenceRow> = sqlx::query_as(&format!(
            "SELECT {REFERENCE_COLUMNS} FROM reference_assets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn candidates_for(
        &self,
        media_type: MediaType,
        hashes: &HashCodes,
    ) -> Result<Vec<ReferenceAsset>, StoreError> {
        let query = hashes.normalized();

        let rows: Vec<ReferenceRow> = if media_type.is_perceptual() {
            if query.phash.is_empty() {
                return Ok(Vec::new());
            }
            sqlx::query_as(&format!(
                "SELECT {REFERENCE_COLUMNS} FROM reference_assets \
                 WHERE media_type = $1 AND phash && $2::text[] ORDER BY id"
            ))
            .bind(media_type.as_str())
            .bind(&query.phash)
            .fetch_all(&self.pool)
            .await?
        } else {
            let Some(simhash) = query.simhash else {
                return Ok(Vec::new());
            };
            sqlx::query_as(&format!(
                "SELECT {REFERENCE_COLUMNS} FROM reference_assets \
                 WHERE media_type = $1 AND simhash = $2 ORDER BY id"
            ))
            .bind(media_type.as_str())
            .bind(simhash)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn set_policy(&self, id: Uuid, policy: Policy) -> Result<ReferenceAsset, StoreError> {
        let row: Option<ReferenceRow> = sqlx::query_as(&format!(
            r#"
            UPDATE reference_assets SET policy = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {REFERENCE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(policy.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::NotFound(format!("reference {id}")))?
            .try_into()
    }

    async fn add_hashes(&self, id: Uuid, hashes: &HashCodes) -> Result<ReferenceAsset, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<ReferenceRow> = sqlx::query_as(&format!(
            "SELECT {REFERENCE_COLUMNS} FROM reference_assets WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut reference: ReferenceAsset = row
            .ok_or_else(|| StoreError::NotFound(format!("reference {id}")))?
            .try_into()?;

        if !reference.hashes.merge(hashes) {
            tx.commit().await?;
            return Ok(reference);
        }

        let updated: ReferenceRow = sqlx::query_as(&format!(
            r#"
            UPDATE reference_assets SET phash = $2, simhash = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {REFERENCE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&reference.hashes.phash)
        .bind(&reference.hashes.simhash)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        reference = updated.try_into()?;

        Ok(reference)
    }
}

#[async_trait]
impl MatchRecorder for PostgresStore {
    async fn record(&self, input: NewMatch) -> Result<MatchRecord, StoreError> {
        let inserted: Option<MatchRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO content_matches
                (id, content_kind, content_id, ref_asset_id, media_type, score, decision, reason, scan_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (content_kind, content_id, scan_id) DO NOTHING
            RETURNING {MATCH_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.content.kind.as_str())
        .bind(&input.content.id)
        .bind(input.ref_asset_id)
        .bind(input.media_type.as_str())
        .bind(input.score)
        .bind(input.decision.as_str())
        .bind(&input.reason)
        .bind(input.scan_id)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => row.try_into(),
            None => self
                .match_by_scan(&input.content, input.scan_id)
                .await?
                .ok_or_else(|| StoreError::Query("match insert conflicted without a row".into())),
        }
    }

    async fn for_content(&self, content: &ContentRef) -> Result<Vec<MatchRecord>, StoreError> {
        let rows: Vec<MatchRow> = sqlx::query_as(&format!(
            "SELECT {MATCH_COLUMNS} FROM content_matches \
             WHERE content_kind = $1 AND content_id = $2 ORDER BY created_at ASC"
        ))
        .bind(content.kind.as_str())
        .bind(&content.id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl ContentRepository for PostgresStore {
    async fn find(&self, content: &ContentRef) -> Result<Option<ModerationState>, StoreError> {
        let row: Option<ModerationRow> = sqlx::query_as(&format!(
            "SELECT status, restriction_reason, copyright_scan_status FROM {} WHERE id = $1",
            content_table(content.kind)
        ))
        .bind(&content.id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update_status(
        &self,
        content: &ContentRef,
        update: &StatusUpdate,
    ) -> Result<ModerationState, StoreError> {
        let row: Option<ModerationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE {} SET
                status = $2,
                restriction_reason = $3,
                copyright_scan_status = COALESCE($4, copyright_scan_status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING status, restriction_reason, copyright_scan_status
            "#,
            content_table(content.kind)
        ))
        .bind(&content.id)
        .bind(update.status.as_str())
        .bind(&update.restriction_reason)
        .bind(update.scan_status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::NotFound(format!("content {content}")))?
            .try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copyguard_core::{ContentStatus, Decision, ScanStatus};

    fn fingerprint_row(content_kind: &str, media_type: &str) -> FingerprintRow {
        FingerprintRow {
            id: Uuid::new_v4(),
            content_kind: content_kind.into(),
            content_id: "42".into(),
            media_type: media_type.into(),
            phash: vec!["ab".into(), "cd".into(), "ab".into()],
            simhash: None,
            version: 3,
            scan_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_reports_column_and_value() {
        assert_eq!(parse::<Policy>("track", "policy").unwrap(), Policy::Track);

        let err = parse::<Policy>("delete", "policy").unwrap_err();
        match err {
            StoreError::Serialization(msg) => {
                assert!(msg.contains("policy"));
                assert!(msg.contains("delete"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_content_table_per_kind() {
        assert_eq!(content_table(ContentKind::Post), "posts");
        assert_eq!(content_table(ContentKind::PostMeta), "post_metas");
    }

    #[test]
    fn test_fingerprint_row_keeps_hash_order() {
        let row = fingerprint_row("post_meta", "image");
        let scan_id = row.scan_id;
        let fingerprint = Fingerprint::try_from(row).unwrap();

        assert_eq!(fingerprint.content, ContentRef::post_meta("42"));
        assert_eq!(fingerprint.media_type, MediaType::Image);
        assert_eq!(fingerprint.hashes.phash, vec!["ab", "cd", "ab"]);
        assert_eq!(fingerprint.version, 3);
        assert_eq!(fingerprint.scan_id, scan_id);
    }

    #[test]
    fn test_fingerprint_row_rejects_unknown_kind() {
        let err = Fingerprint::try_from(fingerprint_row("story", "image")).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));

        let err = Fingerprint::try_from(fingerprint_row("post", "gif")).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_reference_row_conversion() {
        let row = ReferenceRow {
            id: Uuid::from_u128(7),
            owner_id: "label-42".into(),
            media_type: "text".into(),
            phash: Vec::new(),
            simhash: Some("0123456789abcdef".into()),
            policy: "block".into(),
            updated_at: Utc::now(),
        };
        let reference = ReferenceAsset::try_from(row).unwrap();
        assert_eq!(reference.media_type, MediaType::Text);
        assert_eq!(reference.policy, Policy::Block);
        assert_eq!(reference.hashes.simhash.as_deref(), Some("0123456789abcdef"));
    }

    #[test]
    fn test_match_row_rejects_unknown_decision() {
        let row = |decision: &str| MatchRow {
            id: Uuid::new_v4(),
            content_kind: "post".into(),
            content_id: "1".into(),
            ref_asset_id: Uuid::from_u128(7),
            media_type: "image".into(),
            score: 0.95,
            decision: decision.into(),
            reason: "r".into(),
            scan_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };

        let record = MatchRecord::try_from(row("violation")).unwrap();
        assert_eq!(record.decision, Decision::Violation);
        assert_eq!(record.content, ContentRef::post("1"));

        assert!(matches!(
            MatchRecord::try_from(row("maybe")),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_moderation_row_conversion() {
        let state = ModerationState::try_from(ModerationRow {
            status: "restricted".into(),
            restriction_reason: Some("copyright".into()),
            copyright_scan_status: "failed".into(),
        })
        .unwrap();
        assert_eq!(state.status, ContentStatus::Restricted);
        assert_eq!(state.copyright_scan_status, ScanStatus::Failed);

        let err = ModerationState::try_from(ModerationRow {
            status: "hidden".into(),
            restriction_reason: None,
            copyright_scan_status: "pending".into(),
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
