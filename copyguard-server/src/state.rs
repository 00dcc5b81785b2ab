//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use crate::pipeline::ContentStateUpdater;
use crate::queue::ScanQueue;
use crate::store::{Backend, Stores};

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Storage backend, used for readiness checks
    pub backend: Backend,
    /// Persistence seams
    pub stores: Stores,
    /// Scan job queue
    pub queue: Arc<dyn ScanQueue>,
    /// Resolves untagged content ids at the enqueue boundary
    pub content_state: ContentStateUpdater,
}

impl AppState {
    pub fn new(backend: Backend, queue: Arc<dyn ScanQueue>) -> Self {
        let stores = backend.stores();
        let content_state = ContentStateUpdater::new(stores.contents.clone());
        Self {
            backend,
            stores,
            queue,
            content_state,
        }
    }
}
