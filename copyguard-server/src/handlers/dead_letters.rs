//! Dead letter inspection handler

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::queue::{AttemptRecord, DeadLetter};
use crate::state::AppState;

/// Default number of dead letters returned
const DEFAULT_LIMIT: usize = 50;

/// Maximum number of dead letters returned
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeadLetterQuery {
    /// Maximum entries to return (default 50, max 500)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    #[schema(example = 1)]
    pub attempt: u32,
    pub error: String,
    pub retryable: bool,
    #[schema(value_type = String)]
    pub at: DateTime<Utc>,
}

impl From<AttemptRecord> for AttemptResponse {
    fn from(a: AttemptRecord) -> Self {
        Self {
            attempt: a.attempt,
            error: a.error,
            retryable: a.retryable,
            at: a.at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterResponse {
    #[schema(value_type = String)]
    pub job_id: Uuid,
    #[schema(example = "post")]
    pub content_kind: String,
    pub content_id: String,
    #[schema(example = "image")]
    pub media_type: String,
    #[schema(example = "MAX_ATTEMPTS_EXCEEDED")]
    pub reason: String,
    pub error: String,
    pub attempts: Vec<AttemptResponse>,
    #[schema(value_type = String)]
    pub dead_lettered_at: DateTime<Utc>,
}

impl From<DeadLetter> for DeadLetterResponse {
    fn from(d: DeadLetter) -> Self {
        let content = d.job.content().clone();
        Self {
            job_id: d.job_id,
            content_kind: content.kind.as_str().to_string(),
            content_id: content.id,
            media_type: d.job.media_type().as_str().to_string(),
            reason: d.reason.as_str().to_string(),
            error: d.error,
            attempts: d.attempts.into_iter().map(Into::into).collect(),
            dead_lettered_at: d.dead_lettered_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeadLetterListResponse {
    pub count: usize,
    pub items: Vec<DeadLetterResponse>,
}

/// Most recent dead-lettered scan jobs with their attempt history.
#[utoipa::path(
    get,
    path = "/v1/dead-letters",
    tag = "Operations",
    params(DeadLetterQuery),
    responses((status = 200, description = "Dead letters, newest first", body = DeadLetterListResponse))
)]
pub async fn list_dead_letters_handler(
    State(state): State<AppState>,
    Query(query): Query<DeadLetterQuery>,
) -> Result<Json<DeadLetterListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let letters = state.queue.dead_letters(limit).await?;

    let items: Vec<DeadLetterResponse> = letters.into_iter().map(Into::into).collect();
    Ok(Json(DeadLetterListResponse {
        count: items.len(),
        items,
    }))
}
