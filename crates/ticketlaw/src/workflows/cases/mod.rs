//! Case intake, lawyer matching, and lifecycle workflow.

pub mod domain;
pub mod lifecycle;
pub mod matching;
pub mod pricing;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Account, Availability, BankDetails, CaseId, CaseOutcome, CasePayment, CasePaymentStatus,
    CasePricing, CaseRecord, CaseStatistics, CaseStatus, ClientInfo, ClientRating, CourtInfo,
    Jurisdiction, LawyerId, LawyerProfile, MonthlyQuota, OutcomeType, Rating, TicketDetails,
    TicketLocation, TimelineEntry, UserId, ViolationType,
};
pub use lifecycle::{apply_outcome, transition_allowed, LifecycleError};
pub use matching::{score, select, MatchOutcome, MatchRequest};
pub use repository::{
    AccountRepository, CaseRepository, CaseSummaryView, LawyerRepository, LawyerSearch,
    RepositoryError,
};
pub use router::case_router;
pub use service::{
    CaseService, CaseServiceError, NewAccountRequest, NewCaseRequest, RegisterLawyerRequest,
    UpdateStatusRequest,
};
