//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served at `GET /openapi.json`.

use utoipa::OpenApi;

use crate::handlers::{
    AttemptResponse, CreateReferenceRequest, DeadLetterListResponse, DeadLetterResponse,
    EnqueueScanRequest, EnqueueScanResponse, FingerprintHistoryResponse, FingerprintResponse,
    HashCodesBody, HealthResponse, MatchHistoryResponse, MatchResponse, ReadyResponse,
    ReferenceResponse, UpdatePolicyRequest,
};

/// Copyguard API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Copyguard - Copyright Scan API",
        version = "0.1.0",
        description = r#"
## Copyright Match Detection API

Copyguard checks user content against protected reference assets and
enforces the rights holder's policy on the content's moderation state.

- **Perceptual hashing** - 256-bit image hashes robust to re-encoding and resizing
- **Text simHash** - 64-bit near-duplicate fingerprints
- **Policies** - `block`, `track` or `allow`, chosen per reference asset
- **Durable scans** - at-least-once jobs with bounded retries and a dead-letter store

### How It Works

1. Register protected works via `POST /v1/references`
2. Queue a scan for new content via `POST /v1/scans` (returns 202 immediately)
3. A worker extracts fingerprints, finds candidates, scores them and applies the policy
4. Review outcomes via `GET /v1/contents/{id}/matches`
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Scans", description = "Queue copyright scans for user content"),
        (name = "References", description = "Register and administer protected reference assets"),
        (name = "Contents", description = "Match and fingerprint history per content"),
        (name = "Operations", description = "Dead-lettered scan jobs"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::scans::enqueue_scan_handler,
        crate::handlers::references::create_reference_handler,
        crate::handlers::references::get_reference_handler,
        crate::handlers::references::update_policy_handler,
        crate::handlers::references::add_hashes_handler,
        crate::handlers::contents::list_matches_handler,
        crate::handlers::contents::list_fingerprints_handler,
        crate::handlers::dead_letters::list_dead_letters_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            EnqueueScanRequest,
            EnqueueScanResponse,
            CreateReferenceRequest,
            UpdatePolicyRequest,
            HashCodesBody,
            ReferenceResponse,
            MatchResponse,
            MatchHistoryResponse,
            FingerprintResponse,
            FingerprintHistoryResponse,
            AttemptResponse,
            DeadLetterResponse,
            DeadLetterListResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/health",
            "/ready",
            "/v1/scans",
            "/v1/references",
            "/v1/references/{id}",
            "/v1/references/{id}/policy",
            "/v1/references/{id}/hashes",
            "/v1/contents/{id}/matches",
            "/v1/contents/{id}/fingerprints",
            "/v1/dead-letters",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
