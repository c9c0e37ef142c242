//! Candidate selection for newly submitted cases.

mod score;

pub use score::score;

use serde::{Deserialize, Serialize};

use super::domain::{LawyerProfile, ViolationType};

/// The slice of a case the scoring engine looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub violation_type: ViolationType,
    pub state: String,
    pub is_cdl_driver: bool,
}

/// Result of running the matcher over a candidate pool.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched {
        lawyer: LawyerProfile,
        score: f64,
        /// True when the specialization filter had to be relaxed.
        fallback: bool,
    },
    /// No eligible lawyer; the case stays pending for a later retry.
    NoMatch,
}

/// Pick the best-scoring candidate.
///
/// Ties break to the first-encountered candidate: a later candidate only
/// wins with a strictly greater score, so selection is deterministic for a
/// given pool order.
pub fn select(candidates: &[LawyerProfile], request: &MatchRequest) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let value = score(candidate, request);
        match best {
            Some((_, leader)) if value <= leader => {}
            _ => best = Some((index, value)),
        }
    }

    best
}
