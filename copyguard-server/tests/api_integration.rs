//! API integration tests for copyguard-server.
//!
//! These tests exercise the admin API through the full router with the
//! in-memory backend: scan enqueueing, reference administration and the
//! per-content audit endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use copyguard_core::{ContentRef, Decision, MediaType, ModerationState};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use copyguard_server::{
    create_router, AppState, Backend, MatchRecorder, MemoryQueue, MemoryStore, NewMatch,
    ScanJob, ScanQueue,
};

const PHASH: &str = "f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
    state: AppState,
}

/// Build the test router over a fresh in-memory backend
fn create_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new(Duration::from_secs(300)));
    let state = AppState::new(Backend::Memory(store.clone()), queue.clone());
    TestApp {
        router: create_router(state.clone()),
        store,
        queue,
        state,
    }
}

impl TestApp {
    fn seed_post(&self, id: &str) {
        self.store
            .insert_content(ContentRef::post(id), ModerationState::default());
    }

    fn seed_post_meta(&self, id: &str) {
        self.store
            .insert_content(ContentRef::post_meta(id), ModerationState::default());
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn create_reference(&self, policy: &str) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/v1/references",
                Some(json!({
                    "ownerId": "label-42",
                    "mediaType": "image",
                    "hashes": { "pHash": [PHASH] },
                    "policy": policy
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_json() {
    let app = create_test_app();

    let (status, json) = app.send("GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["storage"], "memory");
    assert_eq!(json["pending_jobs"], 0);
    assert_eq!(json["service"], "copyguard-server");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = create_test_app();

    let (status, json) = app.send("GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = create_test_app();

    let (status, json) = app.send("GET", "/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/v1/scans"].is_object());
}

// ============================================================================
// Scan Enqueue Tests
// ============================================================================

#[tokio::test]
async fn test_enqueue_image_scan_is_accepted() {
    let app = create_test_app();
    app.seed_post("post-1");

    let (status, json) = app
        .send(
            "POST",
            "/v1/scans",
            Some(json!({
                "contentId": "post-1",
                "mediaType": "image",
                "urls": ["https://cdn.example.com/a.jpg"]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "queued");
    assert_eq!(json["contentKind"], "post");
    assert_eq!(json["contentId"], "post-1");

    let claimed = app.queue.claim().await.unwrap().expect("job queued");
    assert_eq!(claimed.id.to_string(), json["jobId"].as_str().unwrap());
    assert!(matches!(claimed.job, ScanJob::Image { ref urls, .. } if urls.len() == 1));
}

#[tokio::test]
async fn test_enqueue_text_scan_for_post_meta() {
    let app = create_test_app();
    app.seed_post_meta("meta-1");

    let (status, json) = app
        .send(
            "POST",
            "/v1/scans",
            Some(json!({
                "contentId": "meta-1",
                "mediaType": "text",
                "text": "a caption"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["contentKind"], "post_meta");
    assert_eq!(app.queue.pending().await.unwrap(), 1);
}

#[tokio::test]
async fn test_enqueue_image_scan_without_urls_is_rejected() {
    let app = create_test_app();
    app.seed_post("post-1");

    let (status, json) = app
        .send(
            "POST",
            "/v1/scans",
            Some(json!({ "contentId": "post-1", "mediaType": "image" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
    assert_eq!(app.queue.pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_enqueue_rejects_unscannable_media_type() {
    let app = create_test_app();
    app.seed_post("post-1");

    for media_type in ["video", "audio", "hologram"] {
        let (status, _) = app
            .send(
                "POST",
                "/v1/scans",
                Some(json!({
                    "contentId": "post-1",
                    "mediaType": media_type,
                    "urls": ["https://cdn.example.com/a.mp4"]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{media_type}");
    }
}

#[tokio::test]
async fn test_enqueue_rejects_non_http_locator() {
    let app = create_test_app();
    app.seed_post("post-1");

    let (status, _) = app
        .send(
            "POST",
            "/v1/scans",
            Some(json!({
                "contentId": "post-1",
                "mediaType": "image",
                "urls": ["file:///etc/passwd"]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_enqueue_unknown_content_is_not_found() {
    let app = create_test_app();

    let (status, json) = app
        .send(
            "POST",
            "/v1/scans",
            Some(json!({ "contentId": "ghost", "mediaType": "text", "text": "hi" })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "CONTENT_NOT_FOUND");
}

#[tokio::test]
async fn test_enqueue_ambiguous_id_needs_kind() {
    let app = create_test_app();
    app.seed_post("dup");
    app.seed_post_meta("dup");

    let body = json!({ "contentId": "dup", "mediaType": "text", "text": "hi" });
    let (status, json) = app.send("POST", "/v1/scans", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "AMBIGUOUS_CONTENT");

    let body = json!({
        "contentId": "dup",
        "contentKind": "post_meta",
        "mediaType": "text",
        "text": "hi"
    });
    let (status, json) = app.send("POST", "/v1/scans", Some(body)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["contentKind"], "post_meta");
}

// ============================================================================
// Reference Administration Tests
// ============================================================================

#[tokio::test]
async fn test_reference_lifecycle() {
    let app = create_test_app();
    let created = app.create_reference("block").await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["policy"], "block");
    assert_eq!(created["hashes"]["pHash"][0], PHASH);

    let (status, fetched) = app.send("GET", &format!("/v1/references/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["ownerId"], "label-42");

    let (status, updated) = app
        .send(
            "PUT",
            &format!("/v1/references/{id}/policy"),
            Some(json!({ "policy": "track" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["policy"], "track");

    let extra = "0f".repeat(32);
    let (status, appended) = app
        .send(
            "POST",
            &format!("/v1/references/{id}/hashes"),
            Some(json!({ "pHash": [extra, PHASH] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(appended["hashes"]["pHash"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_reference_rejects_bad_input() {
    let app = create_test_app();

    let cases = [
        json!({ "ownerId": "o", "mediaType": "image", "hashes": { "pHash": [PHASH] }, "policy": "delete" }),
        json!({ "ownerId": "o", "mediaType": "image", "hashes": { "pHash": ["abc"] }, "policy": "block" }),
        json!({ "ownerId": "o", "mediaType": "image", "hashes": {}, "policy": "block" }),
        json!({ "ownerId": " ", "mediaType": "text", "hashes": { "simHash": "0123456789abcdef" }, "policy": "block" }),
    ];

    for body in cases {
        let (status, json) = app.send("POST", "/v1/references", Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["code"], "INVALID_INPUT");
    }
}

#[tokio::test]
async fn test_unknown_reference_is_not_found() {
    let app = create_test_app();
    let id = Uuid::new_v4();

    let (status, json) = app.send("GET", &format!("/v1/references/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");

    let (status, _) = app
        .send(
            "PUT",
            &format!("/v1/references/{id}/policy"),
            Some(json!({ "policy": "allow" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Audit Tests
// ============================================================================

#[tokio::test]
async fn test_match_history_lists_recorded_matches() {
    let app = create_test_app();
    app.seed_post("post-9");
    let reference = app.create_reference("block").await;
    let ref_id: Uuid = reference["id"].as_str().unwrap().parse().unwrap();

    app.state
        .stores
        .matches
        .record(NewMatch {
            content: ContentRef::post("post-9"),
            ref_asset_id: ref_id,
            media_type: MediaType::Image,
            score: 1.0,
            decision: Decision::Violation,
            reason: "score 1.000 >= violation threshold 0.90".into(),
            scan_id: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let (status, json) = app.send("GET", "/v1/contents/post-9/matches", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["contentKind"], "post");
    let matches = json["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["decision"], "violation");
    assert_eq!(matches[0]["refAssetId"], ref_id.to_string());
}

#[tokio::test]
async fn test_fingerprint_history_for_unknown_content_is_not_found() {
    let app = create_test_app();

    let (status, _) = app
        .send("GET", "/v1/contents/ghost/fingerprints", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send("GET", "/v1/contents/ghost/fingerprints?kind=story", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dead_letters_start_empty() {
    let app = create_test_app();

    let (status, json) = app.send("GET", "/v1/dead-letters?limit=10", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 0);
    assert!(json["items"].as_array().unwrap().is_empty());
}
