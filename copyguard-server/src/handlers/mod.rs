//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod contents;
pub mod dead_letters;
pub mod health;
pub mod references;
pub mod scans;

pub use crate::state::AppState;
pub use contents::{
    list_fingerprints_handler, list_matches_handler, FingerprintHistoryResponse,
    FingerprintResponse, MatchHistoryResponse, MatchResponse,
};
pub use dead_letters::{
    list_dead_letters_handler, AttemptResponse, DeadLetterListResponse, DeadLetterResponse,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use references::{
    add_hashes_handler, create_reference_handler, get_reference_handler, update_policy_handler,
    CreateReferenceRequest, HashCodesBody, ReferenceResponse, UpdatePolicyRequest,
};
pub use scans::{enqueue_scan_handler, EnqueueScanRequest, EnqueueScanResponse};
