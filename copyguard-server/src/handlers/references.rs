//! Reference asset administration handlers
//!
//! Rights holders register protected works with their hash codes and a
//! policy. Policy changes and appended hashes apply to every later scan.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use copyguard_core::{HashCodes, MediaType, Policy, ReferenceAsset};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::NewReference;
use crate::validation::validate_hashes;

/// Hash codes as exchanged over the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct HashCodesBody {
    /// 64-hex-character perceptual hashes (image, video, audio)
    #[serde(rename = "pHash", default, skip_serializing_if = "Vec::is_empty")]
    #[schema(example = json!(["f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0"]))]
    pub phash: Vec<String>,
    /// 16-hex-character simHash (text)
    #[serde(rename = "simHash", default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "0123456789abcdef")]
    pub simhash: Option<String>,
}

impl From<HashCodesBody> for HashCodes {
    fn from(body: HashCodesBody) -> Self {
        Self {
            phash: body.phash,
            simhash: body.simhash,
        }
    }
}

impl From<HashCodes> for HashCodesBody {
    fn from(codes: HashCodes) -> Self {
        Self {
            phash: codes.phash,
            simhash: codes.simhash,
        }
    }
}

/// Request to register a reference asset.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReferenceRequest {
    #[schema(example = "label-42")]
    pub owner_id: String,
    /// "image", "video", "audio" or "text"
    #[schema(example = "image")]
    pub media_type: String,
    pub hashes: HashCodesBody,
    /// "block", "track" or "allow"
    #[schema(example = "block")]
    pub policy: String,
}

/// Request to change a reference's policy.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePolicyRequest {
    #[schema(example = "track")]
    pub policy: String,
}

/// A registered reference asset.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceResponse {
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    pub owner_id: String,
    #[schema(example = "image")]
    pub media_type: String,
    pub hashes: HashCodesBody,
    #[schema(example = "block")]
    pub policy: String,
    #[schema(value_type = String, example = "2026-01-07T10:00:00Z")]
    pub updated_at: DateTime<Utc>,
}

impl From<ReferenceAsset> for ReferenceResponse {
    fn from(r: ReferenceAsset) -> Self {
        Self {
            id: r.id,
            owner_id: r.owner_id,
            media_type: r.media_type.as_str().to_string(),
            hashes: r.hashes.into(),
            policy: r.policy.as_str().to_string(),
            updated_at: r.updated_at,
        }
    }
}

fn parse_policy(raw: &str) -> Result<Policy, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Unsupported policy: '{raw}'")))
}

/// Register a reference asset.
#[utoipa::path(
    post,
    path = "/v1/references",
    tag = "References",
    request_body = CreateReferenceRequest,
    responses(
        (status = 201, description = "Reference registered", body = ReferenceResponse),
        (status = 400, description = "Invalid media type, policy or hash codes")
    )
)]
pub async fn create_reference_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateReferenceRequest>,
) -> Result<(StatusCode, Json<ReferenceResponse>), ApiError> {
    if request.owner_id.trim().is_empty() {
        return Err(ApiError::bad_request("ownerId must not be empty"));
    }
    let media_type: MediaType = request
        .media_type
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Unsupported mediaType: '{}'", request.media_type)))?;
    let policy = parse_policy(&request.policy)?;
    let hashes: HashCodes = request.hashes.into();
    validate_hashes(media_type, &hashes)?;

    let reference = state
        .stores
        .references
        .create(NewReference {
            owner_id: request.owner_id,
            media_type,
            hashes,
            policy,
        })
        .await?;

    tracing::info!(
        ref_id = %reference.id,
        media_type = media_type.as_str(),
        policy = policy.as_str(),
        "Reference registered"
    );

    Ok((StatusCode::CREATED, Json(reference.into())))
}

/// Get a reference asset by id.
#[utoipa::path(
    get,
    path = "/v1/references/{id}",
    tag = "References",
    params(("id" = String, Path, description = "Reference id")),
    responses(
        (status = 200, description = "Reference", body = ReferenceResponse),
        (status = 404, description = "Unknown reference")
    )
)]
pub async fn get_reference_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReferenceResponse>, ApiError> {
    let reference = state
        .stores
        .references
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("reference {id}")))?;
    Ok(Json(reference.into()))
}

/// Change a reference's policy.
#[utoipa::path(
    put,
    path = "/v1/references/{id}/policy",
    tag = "References",
    params(("id" = String, Path, description = "Reference id")),
    request_body = UpdatePolicyRequest,
    responses(
        (status = 200, description = "Updated reference", body = ReferenceResponse),
        (status = 400, description = "Unsupported policy"),
        (status = 404, description = "Unknown reference")
    )
)]
pub async fn update_policy_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePolicyRequest>,
) -> Result<Json<ReferenceResponse>, ApiError> {
    let policy = parse_policy(&request.policy)?;
    let reference = state.stores.references.set_policy(id, policy).await?;

    tracing::info!(ref_id = %id, policy = policy.as_str(), "Reference policy changed");

    Ok(Json(reference.into()))
}

/// Append hash codes to a reference.
#[utoipa::path(
    post,
    path = "/v1/references/{id}/hashes",
    tag = "References",
    params(("id" = String, Path, description = "Reference id")),
    request_body = HashCodesBody,
    responses(
        (status = 200, description = "Updated reference", body = ReferenceResponse),
        (status = 400, description = "Hash codes invalid for the reference's media type"),
        (status = 404, description = "Unknown reference")
    )
)]
pub async fn add_hashes_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<HashCodesBody>,
) -> Result<Json<ReferenceResponse>, ApiError> {
    let existing = state
        .stores
        .references
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("reference {id}")))?;

    let hashes: HashCodes = request.into();
    validate_hashes(existing.media_type, &hashes)?;

    let reference = state.stores.references.add_hashes(id, &hashes).await?;
    Ok(Json(reference.into()))
}
