use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::access::{Actor, Role};
use crate::config::BillingConfig;
use crate::workflows::billing::business::{
    BillingState, BusinessAccount, BusinessInvoice, BusinessPlan, MonthlyUsage,
};
use crate::workflows::billing::domain::{BusinessId, Invoice, PaymentId, PaymentRecord};
use crate::workflows::billing::processor::{
    CheckoutLineItem, CheckoutMode, IntentHandle, IntentStatus, PaymentProcessor, ProcessorError,
};
use crate::workflows::billing::repository::{
    BusinessRepository, InvoiceRepository, LedgerRepositoryError, PaymentRepository,
};
use crate::workflows::billing::service::{BillingService, BusinessBillingService, InvoiceService};
use crate::workflows::cases::domain::{
    Availability, BankDetails, CaseId, CaseRecord, CaseStatistics, CaseStatus, ClientInfo,
    CourtInfo, Jurisdiction, LawyerId, LawyerProfile, Rating, TicketDetails, TicketLocation,
    UserId, ViolationType,
};
use crate::workflows::cases::repository::{
    CaseRepository, LawyerRepository, LawyerSearch, RepositoryError,
};

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 1, 16, 0, 0).unwrap()
}

pub(super) fn actor(id: &str, role: Role) -> Actor {
    Actor::new(UserId(id.to_string()), role)
}

pub(super) fn billing_config() -> BillingConfig {
    BillingConfig {
        platform_fee_percent: 20,
        vat_percent: 15,
    }
}

/// Processor double recording every outbound call.
#[derive(Default)]
pub(super) struct RecordingProcessor {
    intents: Mutex<HashMap<String, IntentStatus>>,
    pub refunds: Mutex<Vec<(String, u64)>>,
    pub sessions: Mutex<Vec<(CheckoutMode, String)>>,
    pub fail_refunds: Mutex<bool>,
    sequence: AtomicU64,
}

impl RecordingProcessor {
    pub(super) fn settle_intent(&self, intent_id: &str, charge_ref: &str) {
        self.intents.lock().expect("processor mutex poisoned").insert(
            intent_id.to_string(),
            IntentStatus::Succeeded {
                charge_ref: charge_ref.to_string(),
            },
        );
    }

    pub(super) fn refund_calls(&self) -> usize {
        self.refunds.lock().expect("processor mutex poisoned").len()
    }
}

impl PaymentProcessor for RecordingProcessor {
    fn create_intent(
        &self,
        _amount_cents: u64,
        _currency: &str,
        _metadata: &BTreeMap<String, String>,
    ) -> Result<IntentHandle, ProcessorError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let intent_id = format!("pi_{id:04}");
        self.intents
            .lock()
            .expect("processor mutex poisoned")
            .insert(intent_id.clone(), IntentStatus::Processing);
        Ok(IntentHandle {
            client_secret: format!("{intent_id}_secret"),
            intent_id,
        })
    }

    fn retrieve_intent(&self, intent_id: &str) -> Result<IntentStatus, ProcessorError> {
        self.intents
            .lock()
            .expect("processor mutex poisoned")
            .get(intent_id)
            .cloned()
            .ok_or_else(|| ProcessorError::Rejected(format!("unknown intent {intent_id}")))
    }

    fn create_refund(
        &self,
        charge_ref: &str,
        amount_cents: u64,
    ) -> Result<String, ProcessorError> {
        if *self.fail_refunds.lock().expect("processor mutex poisoned") {
            return Err(ProcessorError::Unavailable("refund endpoint down".to_string()));
        }
        let mut refunds = self.refunds.lock().expect("processor mutex poisoned");
        refunds.push((charge_ref.to_string(), amount_cents));
        Ok(format!("re_{:04}", refunds.len()))
    }

    fn create_checkout_session(
        &self,
        _line_items: &[CheckoutLineItem],
        mode: CheckoutMode,
        customer: &str,
    ) -> Result<String, ProcessorError> {
        self.sessions
            .lock()
            .expect("processor mutex poisoned")
            .push((mode, customer.to_string()));
        Ok(format!("https://checkout.example/{customer}"))
    }
}

#[derive(Default)]
pub(super) struct MemoryPayments {
    records: Mutex<HashMap<PaymentId, PaymentRecord>>,
}

impl PaymentRepository for MemoryPayments {
    fn insert(&self, payment: PaymentRecord) -> Result<PaymentRecord, LedgerRepositoryError> {
        let mut guard = self.records.lock().expect("payments mutex poisoned");
        if guard.contains_key(&payment.payment_id) {
            return Err(LedgerRepositoryError::Conflict);
        }
        guard.insert(payment.payment_id.clone(), payment.clone());
        Ok(payment)
    }

    fn update(&self, payment: PaymentRecord) -> Result<(), LedgerRepositoryError> {
        let mut guard = self.records.lock().expect("payments mutex poisoned");
        if !guard.contains_key(&payment.payment_id) {
            return Err(LedgerRepositoryError::NotFound);
        }
        guard.insert(payment.payment_id.clone(), payment);
        Ok(())
    }

    fn fetch(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, LedgerRepositoryError> {
        let guard = self.records.lock().expect("payments mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_user(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>, LedgerRepositoryError> {
        Ok(self
            .sorted()
            .into_iter()
            .filter(|payment| &payment.user_id == user_id)
            .collect())
    }

    fn for_lawyer(
        &self,
        lawyer_id: &LawyerId,
    ) -> Result<Vec<PaymentRecord>, LedgerRepositoryError> {
        Ok(self
            .sorted()
            .into_iter()
            .filter(|payment| payment.lawyer_id.as_ref() == Some(lawyer_id))
            .collect())
    }

    fn all(&self) -> Result<Vec<PaymentRecord>, LedgerRepositoryError> {
        Ok(self.sorted())
    }
}

impl MemoryPayments {
    fn sorted(&self) -> Vec<PaymentRecord> {
        let guard = self.records.lock().expect("payments mutex poisoned");
        let mut payments: Vec<PaymentRecord> = guard.values().cloned().collect();
        payments.sort_by(|a, b| a.payment_id.0.cmp(&b.payment_id.0));
        payments
    }
}

#[derive(Default)]
pub(super) struct MemoryInvoices {
    records: Mutex<Vec<Invoice>>,
}

impl InvoiceRepository for MemoryInvoices {
    fn insert(&self, invoice: Invoice) -> Result<Invoice, LedgerRepositoryError> {
        let mut guard = self.records.lock().expect("invoices mutex poisoned");
        guard.push(invoice.clone());
        Ok(invoice)
    }

    fn for_user(&self, user_id: &UserId) -> Result<Vec<Invoice>, LedgerRepositoryError> {
        let guard = self.records.lock().expect("invoices mutex poisoned");
        Ok(guard
            .iter()
            .filter(|invoice| &invoice.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(super) struct MemoryBusinesses {
    accounts: Mutex<HashMap<BusinessId, BusinessAccount>>,
    usage: Mutex<Vec<MonthlyUsage>>,
    invoices: Mutex<Vec<BusinessInvoice>>,
}

impl MemoryBusinesses {
    pub(super) fn seed_usage(&self, usage: MonthlyUsage) {
        self.usage.lock().expect("usage mutex poisoned").push(usage);
    }
}

impl BusinessRepository for MemoryBusinesses {
    fn insert(
        &self,
        account: BusinessAccount,
    ) -> Result<BusinessAccount, LedgerRepositoryError> {
        let mut guard = self.accounts.lock().expect("businesses mutex poisoned");
        if guard.contains_key(&account.business_id) {
            return Err(LedgerRepositoryError::Conflict);
        }
        guard.insert(account.business_id.clone(), account.clone());
        Ok(account)
    }

    fn update(&self, account: BusinessAccount) -> Result<(), LedgerRepositoryError> {
        let mut guard = self.accounts.lock().expect("businesses mutex poisoned");
        if !guard.contains_key(&account.business_id) {
            return Err(LedgerRepositoryError::NotFound);
        }
        guard.insert(account.business_id.clone(), account);
        Ok(())
    }

    fn fetch(&self, id: &BusinessId) -> Result<Option<BusinessAccount>, LedgerRepositoryError> {
        let guard = self.accounts.lock().expect("businesses mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn fetch_by_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<BusinessAccount>, LedgerRepositoryError> {
        let guard = self.accounts.lock().expect("businesses mutex poisoned");
        Ok(guard
            .values()
            .find(|account| account.subscription_ref.as_deref() == Some(subscription_ref))
            .cloned())
    }

    fn usage_for(
        &self,
        id: &BusinessId,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlyUsage>, LedgerRepositoryError> {
        let guard = self.usage.lock().expect("usage mutex poisoned");
        Ok(guard
            .iter()
            .find(|usage| &usage.business_id == id && usage.year == year && usage.month == month)
            .cloned())
    }

    fn record_invoice(
        &self,
        invoice: BusinessInvoice,
    ) -> Result<BusinessInvoice, LedgerRepositoryError> {
        let mut guard = self.invoices.lock().expect("invoices mutex poisoned");
        guard.push(invoice.clone());
        Ok(invoice)
    }

    fn billing_history(
        &self,
        id: &BusinessId,
    ) -> Result<Vec<BusinessInvoice>, LedgerRepositoryError> {
        let guard = self.invoices.lock().expect("invoices mutex poisoned");
        Ok(guard
            .iter()
            .filter(|invoice| &invoice.business_id == id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(super) struct SimpleCases {
    records: Mutex<HashMap<CaseId, CaseRecord>>,
}

impl CaseRepository for SimpleCases {
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
        Ok(guard
            .values()
            .filter(|case| &case.user_id == user_id)
            .cloned()
            .collect())
    }

    fn for_lawyer(&self, lawyer_id: &LawyerId) -> Result<Vec<CaseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("cases mutex poisoned");
        Ok(guard
            .values()
            .filter(|case| case.lawyer_id.as_ref() == Some(lawyer_id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(super) struct SimpleLawyers {
    records: Mutex<HashMap<LawyerId, LawyerProfile>>,
}

impl LawyerRepository for SimpleLawyers {
    fn insert(&self, profile: LawyerProfile) -> Result<LawyerProfile, RepositoryError> {
        let mut guard = self.records.lock().expect("lawyers mutex poisoned");
        guard.insert(profile.lawyer_id.clone(), profile.clone());
        Ok(profile)
    }

    fn update(&self, profile: LawyerProfile) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("lawyers mutex poisoned");
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
        _state: &str,
        _specialization: Option<ViolationType>,
    ) -> Result<Vec<LawyerProfile>, RepositoryError> {
        Ok(Vec::new())
    }

    fn reserve_slot(&self, id: &LawyerId) -> Result<LawyerProfile, RepositoryError> {
        self.fetch(id)?.ok_or(RepositoryError::NotFound)
    }

    fn release_slot(&self, _id: &LawyerId) -> Result<(), RepositoryError> {
        Ok(())
    }

    fn search(&self, _filter: &LawyerSearch) -> Result<Vec<LawyerProfile>, RepositoryError> {
        Ok(Vec::new())
    }
}

pub(super) type TestBilling =
    BillingService<MemoryPayments, SimpleCases, SimpleLawyers, RecordingProcessor>;
pub(super) type TestBusinessBilling =
    BusinessBillingService<MemoryBusinesses, RecordingProcessor>;

pub(super) struct Harness {
    pub billing: Arc<TestBilling>,
    pub invoices: Arc<InvoiceService<MemoryInvoices>>,
    pub business: Arc<TestBusinessBilling>,
    pub payments: Arc<MemoryPayments>,
    pub cases: Arc<SimpleCases>,
    pub lawyers: Arc<SimpleLawyers>,
    pub businesses: Arc<MemoryBusinesses>,
    pub processor: Arc<RecordingProcessor>,
}

pub(super) fn harness() -> Harness {
    let payments = Arc::new(MemoryPayments::default());
    let cases = Arc::new(SimpleCases::default());
    let lawyers = Arc::new(SimpleLawyers::default());
    let businesses = Arc::new(MemoryBusinesses::default());
    let invoices_repo = Arc::new(MemoryInvoices::default());
    let processor = Arc::new(RecordingProcessor::default());

    Harness {
        billing: Arc::new(BillingService::new(
            payments.clone(),
            cases.clone(),
            lawyers.clone(),
            processor.clone(),
            billing_config(),
        )),
        invoices: Arc::new(InvoiceService::new(invoices_repo)),
        business: Arc::new(BusinessBillingService::new(
            businesses.clone(),
            processor.clone(),
            billing_config(),
        )),
        payments,
        cases,
        lawyers,
        businesses,
        processor,
    }
}

/// An assigned WA speeding case ready for payment.
pub(super) fn assigned_case(case_id: &str, user: &str, lawyer: &str) -> CaseRecord {
    let ticket = TicketDetails {
        violation_type: ViolationType::Speeding,
        ticket_number: Some("4A-88213".to_string()),
        issue_date: chrono::NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid date"),
        location: TicketLocation {
            street: None,
            city: Some("Seattle".to_string()),
            state: "WA".to_string(),
            county: None,
        },
        court: CourtInfo {
            name: "Seattle Municipal Court".to_string(),
            address: None,
            phone: None,
        },
        fine_cents: 13_600,
        points: Some(2),
        ticket_image: None,
    };

    let mut case = CaseRecord::open(
        CaseId(case_id.to_string()),
        UserId(user.to_string()),
        ticket,
        ClientInfo::default(),
        24_900,
        fixed_now(),
    );
    case.lawyer_id = Some(LawyerId(lawyer.to_string()));
    case.assignment_score = Some(87.5);
    case.record_transition(
        CaseStatus::Assigned,
        "Matched with counsel",
        UserId(user.to_string()),
        fixed_now(),
    )
    .expect("pending to assigned");
    case
}

pub(super) fn lawyer_with_bank(id: &str, user: &str) -> LawyerProfile {
    LawyerProfile {
        lawyer_id: LawyerId(id.to_string()),
        user_id: UserId(user.to_string()),
        license_number: format!("WA-{id}"),
        bar_association: "WSBA".to_string(),
        years_of_experience: 9,
        specializations: vec![ViolationType::Speeding],
        jurisdictions: vec![Jurisdiction {
            state: "WA".to_string(),
            counties: Vec::new(),
            courts: Vec::new(),
        }],
        bio: None,
        is_approved: true,
        availability: Availability {
            is_available: true,
            max_cases: 10,
            current_cases: 1,
        },
        rating: Rating {
            average: 4.4,
            count: 18,
        },
        statistics: CaseStatistics::default(),
        bank_details: Some(BankDetails {
            account_number: "000123456789".to_string(),
            routing_number: "125000024".to_string(),
            account_holder_name: "Riley Okafor".to_string(),
        }),
    }
}

pub(super) fn fleet_account(id: &str, subscription: Option<&str>) -> BusinessAccount {
    BusinessAccount {
        business_id: BusinessId(id.to_string()),
        name: "Evergreen Freight".to_string(),
        plan: BusinessPlan {
            name: "fleet".to_string(),
            monthly_price_cents: 99_900,
            setup_fee_cents: 25_000,
            included_fines: 25,
        },
        subscription_ref: subscription.map(|s| s.to_string()),
        billing: BillingState::Active,
    }
}
