use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::domain::{
    Account, Availability, BankDetails, CaseId, CaseOutcome, CaseRecord, CaseStatus, ClientInfo,
    Jurisdiction, LawyerId, LawyerProfile, MonthlyQuota, Rating, TicketDetails, TimelineEntry,
    UserId, ViolationType,
};
use super::lifecycle::{self, LifecycleError};
use super::matching::{self, MatchOutcome, MatchRequest};
use super::pricing;
use super::repository::{
    AccountRepository, CaseRepository, LawyerRepository, LawyerSearch, RepositoryError,
};
use crate::access::{Actor, Capability, Role};
use crate::http::ErrorKind;

const DEFAULT_CASES_PER_MONTH: u32 = 5;
const DEFAULT_MAX_CASES: u32 = 20;

static CASE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static LAWYER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_case_number() -> CaseId {
    let id = CASE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    CaseId(format!("OTR-{id:06}"))
}

fn next_lawyer_id() -> LawyerId {
    let id = LAWYER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LawyerId(format!("lawyer-{id:04}"))
}

/// Error raised by the case service.
#[derive(Debug, thiserror::Error)]
pub enum CaseServiceError {
    #[error("monthly case quota exceeded")]
    QuotaExceeded,
    #[error("not authorized to access this case")]
    NotAuthorized,
    #[error("case cannot be reassigned in status '{0}'")]
    NotReassignable(&'static str),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CaseServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaseServiceError::QuotaExceeded | CaseServiceError::NotReassignable(_) => {
                ErrorKind::Validation
            }
            CaseServiceError::NotAuthorized => ErrorKind::Authorization,
            CaseServiceError::Lifecycle(LifecycleError::AlreadyRated) => ErrorKind::Conflict,
            CaseServiceError::Lifecycle(_) => ErrorKind::Validation,
            CaseServiceError::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            CaseServiceError::Repository(
                RepositoryError::Conflict | RepositoryError::CapacityExhausted,
            ) => ErrorKind::Conflict,
            CaseServiceError::Repository(RepositoryError::Unavailable(_)) => ErrorKind::Server,
        }
    }
}

/// New-case submission payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCaseRequest {
    pub ticket: TicketDetails,
    #[serde(default)]
    pub client: ClientInfo,
}

/// Status-update payload for lawyers and admins.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CaseStatus,
    pub note: Option<String>,
    pub court_date: Option<DateTime<Utc>>,
    pub outcome: Option<CaseOutcome>,
}

/// Lawyer registration payload; profiles start unapproved.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterLawyerRequest {
    pub user_id: UserId,
    pub license_number: String,
    pub bar_association: String,
    pub years_of_experience: u32,
    pub specializations: Vec<ViolationType>,
    pub jurisdictions: Vec<Jurisdiction>,
    pub bio: Option<String>,
    pub max_cases: Option<u32>,
    pub bank_details: Option<BankDetails>,
}

/// Account provisioning payload; identity (the id itself) comes from the
/// external auth provider.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccountRequest {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: Role,
    pub cases_per_month: Option<u32>,
}

/// Service composing quota checks, pricing, matching, and the lifecycle.
pub struct CaseService<C, L, A> {
    cases: Arc<C>,
    lawyers: Arc<L>,
    accounts: Arc<A>,
}

impl<C, L, A> CaseService<C, L, A>
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    pub fn new(cases: Arc<C>, lawyers: Arc<L>, accounts: Arc<A>) -> Self {
        Self {
            cases,
            lawyers,
            accounts,
        }
    }

    /// Provision an account record for an externally authenticated identity.
    pub fn create_account(
        &self,
        request: NewAccountRequest,
    ) -> Result<Account, CaseServiceError> {
        let account = Account {
            user_id: request.user_id,
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            phone: request.phone,
            role: request.role,
            quota: MonthlyQuota::new(
                request.cases_per_month.unwrap_or(DEFAULT_CASES_PER_MONTH),
            ),
        };
        Ok(self.accounts.insert(account)?)
    }

    /// Submit a new case: quota gate, quote, persist, then match.
    ///
    /// The case is committed before matching runs; a matching failure never
    /// rolls the submission back, it merely leaves the case `pending`.
    pub fn submit(
        &self,
        user_id: &UserId,
        request: NewCaseRequest,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, CaseServiceError> {
        let mut account = self
            .accounts
            .fetch(user_id)?
            .ok_or(RepositoryError::NotFound)?;

        if account.quota.roll_over(now) {
            self.accounts.update(account.clone())?;
        }
        if !account.quota.has_capacity() {
            return Err(CaseServiceError::QuotaExceeded);
        }

        let quoted_cents = pricing::quote(request.ticket.violation_type, &request.client);
        let case = CaseRecord::open(
            next_case_number(),
            user_id.clone(),
            request.ticket,
            request.client,
            quoted_cents,
            now,
        );

        let mut case = self.cases.insert(case)?;

        account.quota.consume();
        self.accounts.update(account)?;

        let outcome = self.assign(&mut case, now)?;
        if let MatchOutcome::Matched { score, fallback, .. } = &outcome {
            info!(
                case = %case.case_number.0,
                score,
                fallback,
                "case matched at submission"
            );
        } else {
            debug!(case = %case.case_number.0, "no eligible lawyer, case stays pending");
        }

        Ok(case)
    }

    /// Re-run the matcher over a still-pending case.
    pub fn rematch(
        &self,
        case_id: &CaseId,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, CaseServiceError> {
        let mut case = self
            .cases
            .fetch(case_id)?
            .ok_or(RepositoryError::NotFound)?;

        if case.status == CaseStatus::Pending {
            self.assign(&mut case, now)?;
        }
        Ok(case)
    }

    /// Candidate query, fallback, scoring, and the guarded slot reservation.
    fn assign(
        &self,
        case: &mut CaseRecord,
        now: DateTime<Utc>,
    ) -> Result<MatchOutcome, CaseServiceError> {
        let request = MatchRequest {
            violation_type: case.ticket.violation_type,
            state: case.ticket.location.state.clone(),
            is_cdl_driver: case.client.is_cdl_driver,
        };

        let mut pool = self
            .lawyers
            .candidates(&request.state, Some(request.violation_type))?;
        let mut fallback = false;
        if pool.is_empty() {
            pool = self.lawyers.candidates(&request.state, None)?;
            fallback = true;
        }

        while let Some((index, score)) = matching::select(&pool, &request) {
            let candidate = pool.remove(index);
            match self.lawyers.reserve_slot(&candidate.lawyer_id) {
                Ok(reserved) => {
                    let counsel = self
                        .accounts
                        .fetch(&reserved.user_id)?
                        .map(|account| account.full_name())
                        .unwrap_or_else(|| reserved.license_number.clone());

                    case.lawyer_id = Some(reserved.lawyer_id.clone());
                    case.assignment_score = Some(score);
                    case.record_transition(
                        CaseStatus::Assigned,
                        format!("Matched with {counsel}"),
                        case.user_id.clone(),
                        now,
                    )?;
                    self.cases.update(case.clone())?;

                    return Ok(MatchOutcome::Matched {
                        lawyer: reserved,
                        score,
                        fallback,
                    });
                }
                // Lost the slot to a concurrent submission; try the runner-up.
                Err(RepositoryError::CapacityExhausted) => continue,
                Err(other) => return Err(other.into()),
            }
        }

        Ok(MatchOutcome::NoMatch)
    }

    /// Fetch a case, enforcing participant-or-admin visibility.
    pub fn get(&self, case_id: &CaseId, actor: &Actor) -> Result<CaseRecord, CaseServiceError> {
        let case = self
            .cases
            .fetch(case_id)?
            .ok_or(RepositoryError::NotFound)?;
        self.authorize_participant(&case, actor)?;
        Ok(case)
    }

    pub fn cases_for_user(&self, user_id: &UserId) -> Result<Vec<CaseRecord>, CaseServiceError> {
        Ok(self.cases.for_user(user_id)?)
    }

    /// The caller's docket, resolved through their lawyer profile.
    pub fn cases_for_lawyer(&self, actor: &Actor) -> Result<Vec<CaseRecord>, CaseServiceError> {
        let lawyer = self
            .lawyers
            .fetch_by_user(&actor.user_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(self.cases.for_lawyer(&lawyer.lawyer_id)?)
    }

    /// Apply a status update, optionally recording court date and outcome.
    pub fn update_status(
        &self,
        case_id: &CaseId,
        request: UpdateStatusRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, CaseServiceError> {
        if !actor.can(Capability::UpdateCaseStatus) {
            return Err(CaseServiceError::NotAuthorized);
        }

        let mut case = self
            .cases
            .fetch(case_id)?
            .ok_or(RepositoryError::NotFound)?;

        // Lawyers may only move their own docket; admins move anything.
        if actor.role == Role::Lawyer {
            let lawyer = self
                .lawyers
                .fetch_by_user(&actor.user_id)?
                .ok_or(RepositoryError::NotFound)?;
            if case.lawyer_id.as_ref() != Some(&lawyer.lawyer_id) {
                return Err(CaseServiceError::NotAuthorized);
            }
        }

        let note = request
            .note
            .unwrap_or_else(|| format!("Status changed to {}", request.status.label()));
        case.record_transition(request.status, note, actor.user_id.clone(), now)?;

        if let Some(court_date) = request.court_date {
            case.court_date = Some(court_date);
        }

        if let Some(outcome) = request.outcome {
            case.set_outcome(outcome.clone());
            if let Some(lawyer_id) = case.lawyer_id.clone() {
                let mut lawyer = self
                    .lawyers
                    .fetch(&lawyer_id)?
                    .ok_or(RepositoryError::NotFound)?;
                lifecycle::apply_outcome(&mut lawyer.statistics, outcome.outcome);
                self.lawyers.update(lawyer)?;
            }
        }

        self.cases.update(case.clone())?;
        Ok(case)
    }

    /// Manually move a case to a different lawyer. The case keeps its
    /// current status; the old slot is released and the new one reserved.
    pub fn reassign(
        &self,
        case_id: &CaseId,
        new_lawyer_id: &LawyerId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, CaseServiceError> {
        if !actor.can(Capability::ReassignCase) {
            return Err(CaseServiceError::NotAuthorized);
        }

        let mut case = self
            .cases
            .fetch(case_id)?
            .ok_or(RepositoryError::NotFound)?;

        if !matches!(
            case.status,
            CaseStatus::Assigned | CaseStatus::InProgress | CaseStatus::CourtScheduled
        ) {
            return Err(CaseServiceError::NotReassignable(case.status.label()));
        }

        let reserved = self.lawyers.reserve_slot(new_lawyer_id)?;
        if let Some(previous) = case.lawyer_id.clone() {
            self.lawyers.release_slot(&previous)?;
        }

        case.lawyer_id = Some(reserved.lawyer_id.clone());
        // Reassignment never changes the status, so this bypasses the
        // transition table while keeping status == last timeline entry.
        case.timeline.push(TimelineEntry {
            status: case.status,
            note: format!("Case reassigned to {}", reserved.license_number),
            actor: actor.user_id.clone(),
            timestamp: now,
        });
        self.cases.update(case.clone())?;

        info!(case = %case.case_number.0, lawyer = %reserved.lawyer_id.0, "case reassigned");
        Ok(case)
    }

    /// Record the client's one-shot rating and fold it into the lawyer's
    /// rolling average.
    pub fn rate(
        &self,
        case_id: &CaseId,
        rating: u8,
        review: Option<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, CaseServiceError> {
        let mut case = self
            .cases
            .fetch(case_id)?
            .ok_or(RepositoryError::NotFound)?;

        if case.user_id != actor.user_id {
            return Err(CaseServiceError::NotAuthorized);
        }

        case.rate(rating, review, now)?;
        self.cases.update(case.clone())?;

        if let Some(lawyer_id) = case.lawyer_id.clone() {
            let mut lawyer = self
                .lawyers
                .fetch(&lawyer_id)?
                .ok_or(RepositoryError::NotFound)?;
            lawyer.rating.record(rating);
            self.lawyers.update(lawyer)?;
        }

        Ok(case)
    }

    /// Register a lawyer profile; it stays invisible to the matcher until
    /// an admin approves it.
    pub fn register_lawyer(
        &self,
        request: RegisterLawyerRequest,
    ) -> Result<LawyerProfile, CaseServiceError> {
        let profile = LawyerProfile {
            lawyer_id: next_lawyer_id(),
            user_id: request.user_id,
            license_number: request.license_number,
            bar_association: request.bar_association,
            years_of_experience: request.years_of_experience,
            specializations: request.specializations,
            jurisdictions: request.jurisdictions,
            bio: request.bio,
            is_approved: false,
            availability: Availability {
                is_available: true,
                max_cases: request.max_cases.unwrap_or(DEFAULT_MAX_CASES),
                current_cases: 0,
            },
            rating: Rating::default(),
            statistics: Default::default(),
            bank_details: request.bank_details,
        };
        Ok(self.lawyers.insert(profile)?)
    }

    pub fn approve_lawyer(
        &self,
        lawyer_id: &LawyerId,
        actor: &Actor,
    ) -> Result<LawyerProfile, CaseServiceError> {
        if !actor.can(Capability::ApproveLawyer) {
            return Err(CaseServiceError::NotAuthorized);
        }

        let mut lawyer = self
            .lawyers
            .fetch(lawyer_id)?
            .ok_or(RepositoryError::NotFound)?;
        lawyer.is_approved = true;
        self.lawyers.update(lawyer.clone())?;
        Ok(lawyer)
    }

    pub fn search_lawyers(
        &self,
        filter: &LawyerSearch,
    ) -> Result<Vec<LawyerProfile>, CaseServiceError> {
        Ok(self.lawyers.search(filter)?)
    }

    fn authorize_participant(
        &self,
        case: &CaseRecord,
        actor: &Actor,
    ) -> Result<(), CaseServiceError> {
        if actor.role == Role::Admin || case.user_id == actor.user_id {
            return Ok(());
        }

        if let Some(case_lawyer) = &case.lawyer_id {
            if let Some(lawyer) = self.lawyers.fetch_by_user(&actor.user_id)? {
                if &lawyer.lawyer_id == case_lawyer {
                    return Ok(());
                }
            }
        }

        Err(CaseServiceError::NotAuthorized)
    }
}
