use serde::{Deserialize, Serialize};

use super::domain::{Account, CaseId, CaseRecord, LawyerId, LawyerProfile, UserId, ViolationType};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("lawyer is at capacity")]
    CapacityExhausted,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for accounts so quota mutations stay transactional.
pub trait AccountRepository: Send + Sync {
    fn insert(&self, account: Account) -> Result<Account, RepositoryError>;
    fn update(&self, account: Account) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &UserId) -> Result<Option<Account>, RepositoryError>;
}

/// Search filter for the public lawyer directory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LawyerSearch {
    pub state: Option<String>,
    pub specialization: Option<ViolationType>,
}

/// Storage abstraction over lawyer profiles.
///
/// `reserve_slot` is the capacity guard: implementations must re-validate
/// `current_cases < max_cases` and increment within one atomic step, so two
/// concurrent submissions cannot both land on a lawyer's last opening.
pub trait LawyerRepository: Send + Sync {
    fn insert(&self, profile: LawyerProfile) -> Result<LawyerProfile, RepositoryError>;
    fn update(&self, profile: LawyerProfile) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &LawyerId) -> Result<Option<LawyerProfile>, RepositoryError>;
    fn fetch_by_user(&self, user_id: &UserId) -> Result<Option<LawyerProfile>, RepositoryError>;

    /// Candidates for matching: approved, available, covering the state,
    /// below capacity; `specialization` narrows to lawyers carrying it.
    fn candidates(
        &self,
        state: &str,
        specialization: Option<ViolationType>,
    ) -> Result<Vec<LawyerProfile>, RepositoryError>;

    /// Atomically claim one case slot. Fails with `CapacityExhausted` when
    /// the lawyer is already full at write time.
    fn reserve_slot(&self, id: &LawyerId) -> Result<LawyerProfile, RepositoryError>;

    /// Return a slot claimed by `reserve_slot` (used on reassignment).
    fn release_slot(&self, id: &LawyerId) -> Result<(), RepositoryError>;

    /// Approved-lawyer directory search.
    fn search(&self, filter: &LawyerSearch) -> Result<Vec<LawyerProfile>, RepositoryError>;
}

/// Storage abstraction over cases.
pub trait CaseRepository: Send + Sync {
    fn insert(&self, case: CaseRecord) -> Result<CaseRecord, RepositoryError>;
    fn update(&self, case: CaseRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &CaseId) -> Result<Option<CaseRecord>, RepositoryError>;
    fn for_user(&self, user_id: &UserId) -> Result<Vec<CaseRecord>, RepositoryError>;
    fn for_lawyer(&self, lawyer_id: &LawyerId) -> Result<Vec<CaseRecord>, RepositoryError>;
}

/// Compact case representation for list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CaseSummaryView {
    pub case_number: CaseId,
    pub status: &'static str,
    pub violation: &'static str,
    pub quoted_cents: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lawyer_id: Option<LawyerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_score: Option<f64>,
}

impl CaseRecord {
    pub fn summary_view(&self) -> CaseSummaryView {
        CaseSummaryView {
            case_number: self.case_number.clone(),
            status: self.status.label(),
            violation: self.ticket.violation_type.label(),
            quoted_cents: self.pricing.quoted_cents,
            lawyer_id: self.lawyer_id.clone(),
            assignment_score: self.assignment_score,
        }
    }
}
