//! Policy decision engine.
//!
//! Pure mapping of `(media type, score, policy)` to a [`Decision`] and a
//! human-readable reason. Thresholds are inclusive.

use serde::{Deserialize, Serialize};

use crate::error::{CopyguardError, Result};
use crate::model::{Decision, MediaType, Policy};

/// Reason attached to every decision under an `allow` policy.
pub const REASON_OWNER_PERMITS: &str = "owner permits usage";

/// Reason attached to scans that found no candidate reference.
pub const REASON_NO_CANDIDATES: &str = "no candidate matches";

/// Inclusive score thresholds for one media family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub violation: f64,
    pub review: f64,
}

impl Thresholds {
    pub fn for_media(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Image | MediaType::Video | MediaType::Audio => Self {
                violation: 0.90,
                review: 0.75,
            },
            MediaType::Text => Self {
                violation: 1.00,
                review: 0.85,
            },
        }
    }
}

/// Decision together with the reason recorded alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    pub decision: Decision,
    pub reason: String,
}

impl PolicyOutcome {
    fn new(decision: Decision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            reason: reason.into(),
        }
    }
}

/// Decide what to do with content that scored `score` against a reference
/// carrying `policy`.
///
/// A score that is NaN or outside `[0, 1]` is an upstream defect and is
/// rejected with [`CopyguardError::PolicyEngine`] rather than allowed.
pub fn decide(media_type: MediaType, score: f64, policy: Policy) -> Result<PolicyOutcome> {
    if !(0.0..=1.0).contains(&score) {
        return Err(CopyguardError::PolicyEngine(format!(
            "score {score} is outside [0, 1]"
        )));
    }

    let t = Thresholds::for_media(media_type);

    let outcome = match policy {
        Policy::Allow => PolicyOutcome::new(Decision::Allow, REASON_OWNER_PERMITS),
        Policy::Block if score >= t.violation => PolicyOutcome::new(
            Decision::Violation,
            format!(
                "{media_type} similarity {score:.3} meets violation threshold {:.2} under block policy",
                t.violation
            ),
        ),
        Policy::Block if score >= t.review => PolicyOutcome::new(
            Decision::Review,
            format!(
                "{media_type} similarity {score:.3} meets review threshold {:.2} under block policy",
                t.review
            ),
        ),
        Policy::Track if score >= t.violation => PolicyOutcome::new(
            Decision::Review,
            format!(
                "{media_type} similarity {score:.3} meets violation threshold {:.2}, tracked for review",
                t.violation
            ),
        ),
        Policy::Block | Policy::Track => PolicyOutcome::new(
            Decision::Allow,
            format!("{media_type} similarity {score:.3} below {policy} thresholds"),
        ),
    };

    Ok(outcome)
}

/// Outcome for scans where candidate retrieval returned nothing.
pub fn no_candidates() -> PolicyOutcome {
    PolicyOutcome::new(Decision::Allow, REASON_NO_CANDIDATES)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MEDIA: [MediaType; 4] = [
        MediaType::Image,
        MediaType::Video,
        MediaType::Audio,
        MediaType::Text,
    ];

    fn sample_scores() -> Vec<f64> {
        (0..=100).map(|i| f64::from(i) / 100.0).collect()
    }

    #[test]
    fn test_allow_policy_always_allows() {
        for mt in ALL_MEDIA {
            for s in sample_scores() {
                let out = decide(mt, s, Policy::Allow).unwrap();
                assert_eq!(out.decision, Decision::Allow);
                assert_eq!(out.reason, REASON_OWNER_PERMITS);
            }
        }
    }

    #[test]
    fn test_track_never_violates() {
        for mt in ALL_MEDIA {
            for s in sample_scores() {
                let out = decide(mt, s, Policy::Track).unwrap();
                assert_ne!(out.decision, Decision::Violation);
            }
        }
    }

    #[test]
    fn test_block_is_monotone_in_score() {
        for mt in ALL_MEDIA {
            let mut previous = Decision::Allow;
            for s in sample_scores() {
                let d = decide(mt, s, Policy::Block).unwrap().decision;
                assert!(d >= previous, "{mt} at {s}: {d} after {previous}");
                previous = d;
            }
        }
    }

    #[test]
    fn test_image_block_boundaries() {
        let d = |s| decide(MediaType::Image, s, Policy::Block).unwrap().decision;
        assert_eq!(d(0.749), Decision::Allow);
        assert_eq!(d(0.75), Decision::Review);
        assert_eq!(d(0.80), Decision::Review);
        assert_eq!(d(0.899), Decision::Review);
        assert_eq!(d(0.90), Decision::Violation);
        assert_eq!(d(1.0), Decision::Violation);
    }

    #[test]
    fn test_text_block_boundaries() {
        let d = |s| decide(MediaType::Text, s, Policy::Block).unwrap().decision;
        assert_eq!(d(0.84), Decision::Allow);
        assert_eq!(d(0.85), Decision::Review);
        assert_eq!(d(0.99), Decision::Review);
        assert_eq!(d(1.0), Decision::Violation);
    }

    #[test]
    fn test_track_at_violation_threshold_is_review() {
        let out = decide(MediaType::Text, 1.0, Policy::Track).unwrap();
        assert_eq!(out.decision, Decision::Review);
        let out = decide(MediaType::Image, 0.89, Policy::Track).unwrap();
        assert_eq!(out.decision, Decision::Allow);
    }

    #[test]
    fn test_out_of_range_score_is_defect() {
        for bad in [f64::NAN, -0.01, 1.01, f64::INFINITY] {
            assert!(matches!(
                decide(MediaType::Image, bad, Policy::Allow),
                Err(CopyguardError::PolicyEngine(_))
            ));
        }
    }

    #[test]
    fn test_no_candidates_outcome() {
        let out = no_candidates();
        assert_eq!(out.decision, Decision::Allow);
        assert_eq!(out.reason, "no candidate matches");
    }

    #[test]
    fn test_decide_is_deterministic() {
        let a = decide(MediaType::Image, 0.93, Policy::Block).unwrap();
        let b = decide(MediaType::Image, 0.93, Policy::Block).unwrap();
        assert_eq!(a, b);
    }
}
