//! Case state machine: validated transitions, outcome bookkeeping, rating.

use chrono::{DateTime, Utc};

use super::domain::{
    CaseOutcome, CaseRecord, CaseStatistics, CaseStatus, ClientRating, OutcomeType, TimelineEntry,
    UserId,
};

/// Errors raised by lifecycle mutations. Nothing is mutated on error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot move case from '{}' to '{}'", from.label(), to.label())]
    InvalidTransition { from: CaseStatus, to: CaseStatus },
    #[error("case already rated")]
    AlreadyRated,
    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),
}

/// The closed transition table.
///
/// Reassignment is the one self-loop: an `assigned` case may stay `assigned`
/// while its lawyer changes.
pub fn transition_allowed(from: CaseStatus, to: CaseStatus) -> bool {
    use CaseStatus::*;

    match from {
        Pending => matches!(to, Assigned),
        Assigned => matches!(to, Assigned | InProgress),
        // Paid cases may close directly when the engagement is cancelled
        // (refund), without passing through an outcome state.
        InProgress => matches!(to, CourtScheduled | Dismissed | Reduced | Lost | Closed),
        CourtScheduled => matches!(to, Dismissed | Reduced | Lost | Closed),
        Dismissed | Reduced | Lost => matches!(to, Closed),
        Closed => false,
    }
}

impl CaseRecord {
    /// Append a timeline entry and advance the status.
    ///
    /// The timeline is strictly append-ordered and the case status always
    /// equals the status of the most recent entry.
    pub fn record_transition(
        &mut self,
        status: CaseStatus,
        note: impl Into<String>,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if !transition_allowed(self.status, status) {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }

        self.timeline.push(TimelineEntry {
            status,
            note: note.into(),
            actor,
            timestamp: at,
        });
        self.status = status;
        Ok(())
    }

    /// Record the court outcome on the case. Lawyer statistics are applied
    /// separately via [`apply_outcome`] so the service controls persistence.
    pub fn set_outcome(&mut self, outcome: CaseOutcome) {
        self.outcome = Some(outcome);
    }

    /// One-shot client rating; the second attempt is a conflict.
    pub fn rate(
        &mut self,
        rating: u8,
        review: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if !(1..=5).contains(&rating) {
            return Err(LifecycleError::RatingOutOfRange(rating));
        }
        if self.client_rating.is_some() {
            return Err(LifecycleError::AlreadyRated);
        }

        self.client_rating = Some(ClientRating {
            rating,
            review,
            rated_at: at,
        });
        Ok(())
    }
}

/// Fold a recorded outcome into the lawyer's statistics.
///
/// Every recorded outcome counts toward `total_cases`; only dismissals and
/// reductions move their dedicated counters. The success rate is recomputed
/// from the counters afterwards.
pub fn apply_outcome(statistics: &mut CaseStatistics, outcome: OutcomeType) {
    match outcome {
        OutcomeType::Dismissed => statistics.cases_dismissed += 1,
        OutcomeType::Reduced => statistics.cases_reduced += 1,
        OutcomeType::Guilty | OutcomeType::Pending => {}
    }
    statistics.total_cases += 1;
    statistics.recompute_success_rate();
}
