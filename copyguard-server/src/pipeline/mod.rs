//! Scan pipeline: content state, leases and the enforcement orchestrator.

mod content_state;
mod error;
mod lease;
mod orchestrator;

pub use content_state::{parse_kind, transition_for, ContentStateUpdater, RESTRICTION_REASON};
pub use error::ScanError;
pub use lease::{LeaseGuard, ScanLeases};
pub use orchestrator::{Orchestrator, ScanOutcome, ScanStage};
