use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::access::{Actor, Role};
use crate::workflows::cases::domain::{
    Account, Availability, CaseId, CaseRecord, CaseStatistics, ClientInfo, CourtInfo,
    Jurisdiction, LawyerId, LawyerProfile, MonthlyQuota, Rating, TicketDetails, TicketLocation,
    UserId, ViolationType,
};
use crate::workflows::cases::repository::{
    AccountRepository, CaseRepository, LawyerRepository, LawyerSearch, RepositoryError,
};
use crate::workflows::cases::service::{CaseService, NewCaseRequest};

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 15, 9, 30, 0).unwrap()
}

#[derive(Default)]
pub(super) struct MemoryAccounts {
    records: Mutex<HashMap<UserId, Account>>,
}

impl AccountRepository for MemoryAccounts {
    fn insert(&self, account: Account) -> Result<Account, RepositoryError> {
        let mut guard = self.records.lock().expect("accounts mutex poisoned");
        if guard.contains_key(&account.user_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(account.user_id.clone(), account.clone());
        Ok(account)
    }

    fn update(&self, account: Account) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("accounts mutex poisoned");
        if !guard.contains_key(&account.user_id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(account.user_id.clone(), account);
        Ok(())
    }

    fn fetch(&self, id: &UserId) -> Result<Option<Account>, RepositoryError> {
        let guard = self.records.lock().expect("accounts mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryLawyers {
    records: Mutex<HashMap<LawyerId, LawyerProfile>>,
}

impl MemoryLawyers {
    fn sorted(&self, mut profiles: Vec<LawyerProfile>) -> Vec<LawyerProfile> {
        profiles.sort_by(|a, b| a.lawyer_id.0.cmp(&b.lawyer_id.0));
        profiles
    }
}

impl LawyerRepository for MemoryLawyers {
    fn insert(&self, profile: LawyerProfile) -> Result<LawyerProfile, RepositoryError> {
        let mut guard = self.records.lock().expect("lawyers mutex poisoned");
        let duplicate = guard.values().any(|existing| {
            existing.license_number == profile.license_number
                || existing.lawyer_id == profile.lawyer_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(profile.lawyer_id.clone(), profile.clone());
        Ok(profile)
    }

    fn update(&self, profile: LawyerProfile) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("lawyers mutex poisoned");
        if !guard.contains_key(&profile.lawyer_id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(profile.lawyer_id.clone(), profile);
        Ok(())
    }

    fn fetch(&self, id: &LawyerId) -> Result<Option<LawyerProfile>, RepositoryError> {
        let guard = self.records.lock().expect("lawyers mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn fetch_by_user(&self, user_id: &UserId) -> Result<Option<LawyerProfile>, RepositoryError> {
        let guard = self.records.lock().expect("lawyers mutex poisoned");
        Ok(guard
            .values()
            .find(|profile| &profile.user_id == user_id)
            .cloned())
    }

    fn candidates(
        &self,
        state: &str,
        specialization: Option<ViolationType>,
    ) -> Result<Vec<LawyerProfile>, RepositoryError> {
        let guard = self.records.lock().expect("lawyers mutex poisoned");
        let matches: Vec<LawyerProfile> = guard
            .values()
            .filter(|profile| {
                profile.is_approved
                    && profile.availability.has_open_slot()
                    && profile.covers_state(state)
                    && specialization
                        .map(|violation| profile.specializes_in(violation))
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        Ok(self.sorted(matches))
    }

    fn reserve_slot(&self, id: &LawyerId) -> Result<LawyerProfile, RepositoryError> {
        let mut guard = self.records.lock().expect("lawyers mutex poisoned");
        let profile = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if !profile.availability.has_open_slot() {
            return Err(RepositoryError::CapacityExhausted);
        }
        profile.availability.current_cases += 1;
        Ok(profile.clone())
    }

    fn release_slot(&self, id: &LawyerId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("lawyers mutex poisoned");
        let profile = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        profile.availability.current_cases = profile.availability.current_cases.saturating_sub(1);
        Ok(())
    }

    fn search(&self, filter: &LawyerSearch) -> Result<Vec<LawyerProfile>, RepositoryError> {
        let guard = self.records.lock().expect("lawyers mutex poisoned");
        let matches: Vec<LawyerProfile> = guard
            .values()
            .filter(|profile| {
                profile.is_approved
                    && filter
                        .state
                        .as_deref()
                        .map(|state| profile.covers_state(state))
                        .unwrap_or(true)
                    && filter
                        .specialization
                        .map(|violation| profile.specializes_in(violation))
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        Ok(self.sorted(matches))
    }
}

#[derive(Default)]
pub(super) struct MemoryCases {
    records: Mutex<HashMap<CaseId, CaseRecord>>,
}

impl CaseRepository for MemoryCases {
    fn insert(&self, case: CaseRecord) -> Result<CaseRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("cases mutex poisoned");
        if guard.contains_key(&case.case_number) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(case.case_number.clone(), case.clone());
        Ok(case)
    }

    fn update(&self, case: CaseRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("cases mutex poisoned");
        if !guard.contains_key(&case.case_number) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(case.case_number.clone(), case);
        Ok(())
    }

    fn fetch(&self, id: &CaseId) -> Result<Option<CaseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("cases mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_user(&self, user_id: &UserId) -> Result<Vec<CaseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("cases mutex poisoned");
        let mut cases: Vec<CaseRecord> = guard
            .values()
            .filter(|case| &case.user_id == user_id)
            .cloned()
            .collect();
        cases.sort_by(|a, b| a.case_number.0.cmp(&b.case_number.0));
        Ok(cases)
    }

    fn for_lawyer(&self, lawyer_id: &LawyerId) -> Result<Vec<CaseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("cases mutex poisoned");
        let mut cases: Vec<CaseRecord> = guard
            .values()
            .filter(|case| case.lawyer_id.as_ref() == Some(lawyer_id))
            .cloned()
            .collect();
        cases.sort_by(|a, b| a.case_number.0.cmp(&b.case_number.0));
        Ok(cases)
    }
}

pub(super) type TestService = CaseService<MemoryCases, MemoryLawyers, MemoryAccounts>;

pub(super) struct Harness {
    pub service: Arc<TestService>,
    pub lawyers: Arc<MemoryLawyers>,
    pub accounts: Arc<MemoryAccounts>,
}

pub(super) fn harness() -> Harness {
    let cases = Arc::new(MemoryCases::default());
    let lawyers = Arc::new(MemoryLawyers::default());
    let accounts = Arc::new(MemoryAccounts::default());
    let service = Arc::new(CaseService::new(
        cases,
        lawyers.clone(),
        accounts.clone(),
    ));
    Harness {
        service,
        lawyers,
        accounts,
    }
}

pub(super) fn account(id: &str, role: Role) -> Account {
    Account {
        user_id: UserId(id.to_string()),
        email: format!("{id}@example.com"),
        first_name: "Jordan".to_string(),
        last_name: "Reyes".to_string(),
        phone: "206-555-0100".to_string(),
        role,
        quota: MonthlyQuota {
            cases_per_month: 5,
            cases_used: 0,
            reset_date: Some(fixed_now() + chrono::Duration::days(10)),
        },
    }
}

pub(super) fn actor(id: &str, role: Role) -> Actor {
    Actor::new(UserId(id.to_string()), role)
}

pub(super) fn wa_lawyer(id: &str, license: &str, specializations: Vec<ViolationType>) -> LawyerProfile {
    LawyerProfile {
        lawyer_id: LawyerId(id.to_string()),
        user_id: UserId(format!("user-{id}")),
        license_number: license.to_string(),
        bar_association: "WSBA".to_string(),
        years_of_experience: 8,
        specializations,
        jurisdictions: vec![Jurisdiction {
            state: "WA".to_string(),
            counties: vec!["King".to_string()],
            courts: vec!["Seattle Municipal Court".to_string()],
        }],
        bio: None,
        is_approved: true,
        availability: Availability {
            is_available: true,
            max_cases: 10,
            current_cases: 0,
        },
        rating: Rating {
            average: 4.5,
            count: 20,
        },
        statistics: CaseStatistics {
            total_cases: 10,
            cases_won: 5,
            cases_dismissed: 2,
            cases_reduced: 1,
            success_rate: 80,
        },
        bank_details: None,
    }
}

pub(super) fn speeding_ticket(state: &str) -> TicketDetails {
    TicketDetails {
        violation_type: ViolationType::Speeding,
        ticket_number: Some("4A-88213".to_string()),
        issue_date: chrono::NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid date"),
        location: TicketLocation {
            street: Some("Aurora Ave N".to_string()),
            city: Some("Seattle".to_string()),
            state: state.to_string(),
            county: Some("King".to_string()),
        },
        court: CourtInfo {
            name: "Seattle Municipal Court".to_string(),
            address: None,
            phone: None,
        },
        fine_cents: 13_600,
        points: Some(2),
        ticket_image: Some("tickets/4a-88213.jpg".to_string()),
    }
}

pub(super) fn submission(state: &str) -> NewCaseRequest {
    NewCaseRequest {
        ticket: speeding_ticket(state),
        client: ClientInfo::default(),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is json")
}
