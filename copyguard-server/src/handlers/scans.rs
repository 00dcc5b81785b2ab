//! Scan enqueue handler
//!
//! Handles POST /v1/scans. Scanning is fire-and-forget: the request is
//! validated, the content reference resolved, and a job enqueued.

use axum::{extract::State, http::StatusCode, Json};
use copyguard_core::{ContentRef, MediaType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::pipeline::parse_kind;
use crate::queue::ScanJob;
use crate::state::AppState;
use crate::validation::{
    parse_scannable_media_type, validate_content_id, validate_locators, validate_text,
};

/// Request to scan one piece of content.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueScanRequest {
    /// Id of the post or post meta to scan
    #[schema(example = "post-123")]
    pub content_id: String,

    /// "post" or "post_meta"; resolved by probing both shapes when omitted
    #[serde(default)]
    #[schema(example = "post")]
    pub content_kind: Option<String>,

    /// "image" or "text"
    #[schema(example = "image")]
    pub media_type: String,

    /// Media locators, one per attached image (image scans)
    #[serde(default)]
    #[schema(example = json!(["https://cdn.example.com/a.jpg"]))]
    pub urls: Option<Vec<String>>,

    /// Text body (text scans)
    #[serde(default)]
    pub text: Option<String>,
}

/// Accepted scan job.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueScanResponse {
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub job_id: Uuid,
    #[schema(example = "post")]
    pub content_kind: String,
    #[schema(example = "post-123")]
    pub content_id: String,
    #[schema(example = "queued")]
    pub status: &'static str,
}

/// Enqueue a copyright scan.
///
/// Returns 202 as soon as the job is durably queued; the scan itself runs
/// on the worker pool.
#[utoipa::path(
    post,
    path = "/v1/scans",
    tag = "Scans",
    request_body = EnqueueScanRequest,
    responses(
        (status = 202, description = "Scan queued", body = EnqueueScanResponse),
        (status = 400, description = "Invalid request (missing urls/text, unsupported media type)"),
        (status = 404, description = "Content does not exist"),
        (status = 409, description = "Content id exists as both post and post meta")
    )
)]
pub async fn enqueue_scan_handler(
    State(state): State<AppState>,
    Json(request): Json<EnqueueScanRequest>,
) -> Result<(StatusCode, Json<EnqueueScanResponse>), ApiError> {
    validate_content_id(&request.content_id)?;
    let media_type = parse_scannable_media_type(&request.media_type)?;

    match media_type {
        MediaType::Image => validate_locators(request.urls.as_deref())?,
        _ => validate_text(request.text.as_deref())?,
    }

    let kind = parse_kind(request.content_kind.as_deref())
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let content = match kind {
        Some(kind) => {
            let content = ContentRef::new(kind, request.content_id);
            state.content_state.get(&content).await?;
            content
        }
        None => state.content_state.resolve(&request.content_id).await?,
    };

    let job = match media_type {
        MediaType::Image => ScanJob::Image {
            content,
            urls: request.urls.unwrap_or_default(),
        },
        _ => ScanJob::Text {
            content,
            text: request.text.unwrap_or_default(),
        },
    };

    let content = job.content().clone();
    let job_id = state.queue.enqueue(job).await?;

    tracing::info!(
        job_id = %job_id,
        content = %content,
        media_type = media_type.as_str(),
        "Scan enqueued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueScanResponse {
            job_id,
            content_kind: content.kind.as_str().to_string(),
            content_id: content.id,
            status: "queued",
        }),
    ))
}
