//! Content audit handlers
//!
//! Read-only access to the match and fingerprint history of a content,
//! used when reviewing disputes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use copyguard_core::{ContentRef, Fingerprint, MatchRecord};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::references::HashCodesBody;
use crate::error::ApiError;
use crate::pipeline::parse_kind;
use crate::state::AppState;

/// Optional content kind; probed when omitted.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContentQuery {
    /// "post" or "post_meta"
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    #[schema(value_type = String)]
    pub ref_asset_id: Uuid,
    #[schema(example = "image")]
    pub media_type: String,
    #[schema(example = 0.96)]
    pub score: f64,
    #[schema(example = "violation")]
    pub decision: String,
    pub reason: String,
    #[schema(value_type = String)]
    pub scan_id: Uuid,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<MatchRecord> for MatchResponse {
    fn from(m: MatchRecord) -> Self {
        Self {
            id: m.id,
            ref_asset_id: m.ref_asset_id,
            media_type: m.media_type.as_str().to_string(),
            score: m.score,
            decision: m.decision.as_str().to_string(),
            reason: m.reason,
            scan_id: m.scan_id,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintResponse {
    #[schema(example = 2)]
    pub version: i64,
    #[schema(example = "image")]
    pub media_type: String,
    pub hashes: HashCodesBody,
    #[schema(value_type = String)]
    pub scan_id: Uuid,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<Fingerprint> for FingerprintResponse {
    fn from(f: Fingerprint) -> Self {
        Self {
            version: f.version,
            media_type: f.media_type.as_str().to_string(),
            hashes: f.hashes.into(),
            scan_id: f.scan_id,
            created_at: f.created_at,
        }
    }
}

/// Match history of one content.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchHistoryResponse {
    #[schema(example = "post")]
    pub content_kind: String,
    pub content_id: String,
    pub matches: Vec<MatchResponse>,
}

/// Fingerprint history of one content.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintHistoryResponse {
    #[schema(example = "post")]
    pub content_kind: String,
    pub content_id: String,
    pub fingerprints: Vec<FingerprintResponse>,
}

async fn content_ref(
    state: &AppState,
    id: &str,
    query: &ContentQuery,
) -> Result<ContentRef, ApiError> {
    let kind =
        parse_kind(query.kind.as_deref()).map_err(|e| ApiError::bad_request(e.to_string()))?;
    match kind {
        Some(kind) => Ok(ContentRef::new(kind, id)),
        None => Ok(state.content_state.resolve(id).await?),
    }
}

/// Matches recorded for a content, oldest first.
#[utoipa::path(
    get,
    path = "/v1/contents/{id}/matches",
    tag = "Contents",
    params(("id" = String, Path, description = "Content id"), ContentQuery),
    responses(
        (status = 200, description = "Match history", body = MatchHistoryResponse),
        (status = 404, description = "Unknown content"),
        (status = 409, description = "Ambiguous content id; pass kind")
    )
)]
pub async fn list_matches_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<MatchHistoryResponse>, ApiError> {
    let content = content_ref(&state, &id, &query).await?;
    let matches = state.stores.matches.for_content(&content).await?;

    Ok(Json(MatchHistoryResponse {
        content_kind: content.kind.as_str().to_string(),
        content_id: content.id,
        matches: matches.into_iter().map(Into::into).collect(),
    }))
}

/// Fingerprint versions of a content, oldest first.
#[utoipa::path(
    get,
    path = "/v1/contents/{id}/fingerprints",
    tag = "Contents",
    params(("id" = String, Path, description = "Content id"), ContentQuery),
    responses(
        (status = 200, description = "Fingerprint history", body = FingerprintHistoryResponse),
        (status = 404, description = "Unknown content"),
        (status = 409, description = "Ambiguous content id; pass kind")
    )
)]
pub async fn list_fingerprints_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<FingerprintHistoryResponse>, ApiError> {
    let content = content_ref(&state, &id, &query).await?;
    let history = state.stores.fingerprints.history(&content).await?;

    Ok(Json(FingerprintHistoryResponse {
        content_kind: content.kind.as_str().to_string(),
        content_id: content.id,
        fingerprints: history.into_iter().map(Into::into).collect(),
    }))
}
