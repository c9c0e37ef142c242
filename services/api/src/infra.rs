use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use metrics_exporter_prometheus::PrometheusHandle;
use ticketlaw::access::{Actor, Role};
use ticketlaw::workflows::billing::{
    BusinessAccount, BusinessId, BusinessInvoice, BusinessRepository, CheckoutLineItem,
    CheckoutMode, IntentHandle, IntentStatus, Invoice, InvoiceRepository, LedgerRepositoryError,
    MonthlyUsage, PaymentId, PaymentProcessor, PaymentRecord, PaymentRepository, ProcessorError,
};
use ticketlaw::workflows::cases::{
    Account, AccountRepository, CaseId, CaseRecord, CaseRepository, LawyerId, LawyerProfile,
    LawyerRepository, LawyerSearch, RepositoryError, UserId, ViolationType,
};
use ticketlaw::workflows::messages::{Message, MessageRepository};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) verifier: Arc<dyn TokenVerifier>,
}

/// Resolves bearer tokens to actors. Token issuance belongs to the external
/// identity provider; this boundary only maps a presented token to an
/// already-authenticated identity.
pub(crate) trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<Actor>;
}

/// Static token table for local runs and tests.
#[derive(Default)]
pub(crate) struct StaticTokenVerifier {
    tokens: Mutex<HashMap<String, Actor>>,
}

impl StaticTokenVerifier {
    pub(crate) fn grant(&self, token: &str, user_id: &str, role: Role) {
        self.tokens.lock().expect("token mutex poisoned").insert(
            token.to_string(),
            Actor::new(UserId(user_id.to_string()), role),
        );
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<Actor> {
        self.tokens
            .lock()
            .expect("token mutex poisoned")
            .get(token)
            .cloned()
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAccountRepository {
    records: Mutex<HashMap<UserId, Account>>,
}

impl AccountRepository for InMemoryAccountRepository {
    fn insert(&self, account: Account) -> Result<Account, RepositoryError> {
        let mut guard = self.records.lock().expect("account mutex poisoned");
        let duplicate = guard.contains_key(&account.user_id)
            || guard
                .values()
                .any(|existing| existing.email.eq_ignore_ascii_case(&account.email));
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(account.user_id.clone(), account.clone());
        Ok(account)
    }

    fn update(&self, account: Account) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("account mutex poisoned");
        if !guard.contains_key(&account.user_id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(account.user_id.clone(), account);
        Ok(())
    }

    fn fetch(&self, id: &UserId) -> Result<Option<Account>, RepositoryError> {
        let guard = self.records.lock().expect("account mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryLawyerRepository {
    records: Mutex<HashMap<LawyerId, LawyerProfile>>,
}

impl InMemoryLawyerRepository {
    fn sorted(mut profiles: Vec<LawyerProfile>) -> Vec<LawyerProfile> {
        profiles.sort_by(|a, b| a.lawyer_id.0.cmp(&b.lawyer_id.0));
        profiles
    }
}

impl LawyerRepository for InMemoryLawyerRepository {
    fn insert(&self, profile: LawyerProfile) -> Result<LawyerProfile, RepositoryError> {
        let mut guard = self.records.lock().expect("lawyer mutex poisoned");
        let duplicate = guard.contains_key(&profile.lawyer_id)
            || guard
                .values()
                .any(|existing| existing.license_number == profile.license_number);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(profile.lawyer_id.clone(), profile.clone());
        Ok(profile)
    }

    fn update(&self, profile: LawyerProfile) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("lawyer mutex poisoned");
        if !guard.contains_key(&profile.lawyer_id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(profile.lawyer_id.clone(), profile);
        Ok(())
    }

    fn fetch(&self, id: &LawyerId) -> Result<Option<LawyerProfile>, RepositoryError> {
        let guard = self.records.lock().expect("lawyer mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn fetch_by_user(&self, user_id: &UserId) -> Result<Option<LawyerProfile>, RepositoryError> {
        let guard = self.records.lock().expect("lawyer mutex poisoned");
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
        let guard = self.records.lock().expect("lawyer mutex poisoned");
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
        Ok(Self::sorted(matches))
    }

    // The capacity precondition is re-checked under the same lock that
    // performs the increment, so concurrent submissions serialize here.
    fn reserve_slot(&self, id: &LawyerId) -> Result<LawyerProfile, RepositoryError> {
        let mut guard = self.records.lock().expect("lawyer mutex poisoned");
        let profile = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if !profile.availability.has_open_slot() {
            return Err(RepositoryError::CapacityExhausted);
        }
        profile.availability.current_cases += 1;
        Ok(profile.clone())
    }

    fn release_slot(&self, id: &LawyerId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("lawyer mutex poisoned");
        let profile = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        profile.availability.current_cases = profile.availability.current_cases.saturating_sub(1);
        Ok(())
    }

    fn search(&self, filter: &LawyerSearch) -> Result<Vec<LawyerProfile>, RepositoryError> {
        let guard = self.records.lock().expect("lawyer mutex poisoned");
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
        Ok(Self::sorted(matches))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryCaseRepository {
    records: Mutex<HashMap<CaseId, CaseRecord>>,
}

impl InMemoryCaseRepository {
    fn sorted(mut cases: Vec<CaseRecord>) -> Vec<CaseRecord> {
        cases.sort_by(|a, b| a.case_number.0.cmp(&b.case_number.0));
        cases
    }
}

impl CaseRepository for InMemoryCaseRepository {
    fn insert(&self, case: CaseRecord) -> Result<CaseRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("case mutex poisoned");
        if guard.contains_key(&case.case_number) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(case.case_number.clone(), case.clone());
        Ok(case)
    }

    fn update(&self, case: CaseRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("case mutex poisoned");
        if !guard.contains_key(&case.case_number) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(case.case_number.clone(), case);
        Ok(())
    }

    fn fetch(&self, id: &CaseId) -> Result<Option<CaseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("case mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_user(&self, user_id: &UserId) -> Result<Vec<CaseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("case mutex poisoned");
        Ok(Self::sorted(
            guard
                .values()
                .filter(|case| &case.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    fn for_lawyer(&self, lawyer_id: &LawyerId) -> Result<Vec<CaseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("case mutex poisoned");
        Ok(Self::sorted(
            guard
                .values()
                .filter(|case| case.lawyer_id.as_ref() == Some(lawyer_id))
                .cloned()
                .collect(),
        ))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryPaymentRepository {
    records: Mutex<HashMap<PaymentId, PaymentRecord>>,
}

impl InMemoryPaymentRepository {
    fn sorted(&self) -> Vec<PaymentRecord> {
        let guard = self.records.lock().expect("payment mutex poisoned");
        let mut payments: Vec<PaymentRecord> = guard.values().cloned().collect();
        payments.sort_by(|a, b| a.payment_id.0.cmp(&b.payment_id.0));
        payments
    }
}

impl PaymentRepository for InMemoryPaymentRepository {
    fn insert(&self, payment: PaymentRecord) -> Result<PaymentRecord, LedgerRepositoryError> {
        let mut guard = self.records.lock().expect("payment mutex poisoned");
        if guard.contains_key(&payment.payment_id) {
            return Err(LedgerRepositoryError::Conflict);
        }
        guard.insert(payment.payment_id.clone(), payment.clone());
        Ok(payment)
    }

    fn update(&self, payment: PaymentRecord) -> Result<(), LedgerRepositoryError> {
        let mut guard = self.records.lock().expect("payment mutex poisoned");
        if !guard.contains_key(&payment.payment_id) {
            return Err(LedgerRepositoryError::NotFound);
        }
        guard.insert(payment.payment_id.clone(), payment);
        Ok(())
    }

    fn fetch(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, LedgerRepositoryError> {
        let guard = self.records.lock().expect("payment mutex poisoned");
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

#[derive(Default)]
pub(crate) struct InMemoryInvoiceRepository {
    records: Mutex<Vec<Invoice>>,
}

impl InvoiceRepository for InMemoryInvoiceRepository {
    fn insert(&self, invoice: Invoice) -> Result<Invoice, LedgerRepositoryError> {
        self.records
            .lock()
            .expect("invoice mutex poisoned")
            .push(invoice.clone());
        Ok(invoice)
    }

    fn for_user(&self, user_id: &UserId) -> Result<Vec<Invoice>, LedgerRepositoryError> {
        let guard = self.records.lock().expect("invoice mutex poisoned");
        Ok(guard
            .iter()
            .filter(|invoice| &invoice.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryBusinessRepository {
    accounts: Mutex<HashMap<BusinessId, BusinessAccount>>,
    usage: Mutex<Vec<MonthlyUsage>>,
    invoices: Mutex<Vec<BusinessInvoice>>,
}

impl BusinessRepository for InMemoryBusinessRepository {
    fn insert(&self, account: BusinessAccount) -> Result<BusinessAccount, LedgerRepositoryError> {
        let mut guard = self.accounts.lock().expect("business mutex poisoned");
        if guard.contains_key(&account.business_id) {
            return Err(LedgerRepositoryError::Conflict);
        }
        guard.insert(account.business_id.clone(), account.clone());
        Ok(account)
    }

    fn update(&self, account: BusinessAccount) -> Result<(), LedgerRepositoryError> {
        let mut guard = self.accounts.lock().expect("business mutex poisoned");
        if !guard.contains_key(&account.business_id) {
            return Err(LedgerRepositoryError::NotFound);
        }
        guard.insert(account.business_id.clone(), account);
        Ok(())
    }

    fn fetch(&self, id: &BusinessId) -> Result<Option<BusinessAccount>, LedgerRepositoryError> {
        let guard = self.accounts.lock().expect("business mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn fetch_by_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<BusinessAccount>, LedgerRepositoryError> {
        let guard = self.accounts.lock().expect("business mutex poisoned");
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
        self.invoices
            .lock()
            .expect("invoice mutex poisoned")
            .push(invoice.clone());
        Ok(invoice)
    }

    fn billing_history(
        &self,
        id: &BusinessId,
    ) -> Result<Vec<BusinessInvoice>, LedgerRepositoryError> {
        let guard = self.invoices.lock().expect("invoice mutex poisoned");
        Ok(guard
            .iter()
            .filter(|invoice| &invoice.business_id == id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryMessageRepository {
    records: Mutex<Vec<Message>>,
}

impl MessageRepository for InMemoryMessageRepository {
    fn insert(&self, message: Message) -> Result<Message, RepositoryError> {
        self.records
            .lock()
            .expect("message mutex poisoned")
            .push(message.clone());
        Ok(message)
    }

    fn for_case(&self, case_id: &CaseId) -> Result<Vec<Message>, RepositoryError> {
        let guard = self.records.lock().expect("message mutex poisoned");
        Ok(guard
            .iter()
            .filter(|message| &message.case_number == case_id)
            .cloned()
            .collect())
    }
}

/// Sandbox processor for local runs: every intent settles immediately and
/// refunds always succeed.
#[derive(Default)]
pub(crate) struct SandboxProcessor {
    sequence: AtomicU64,
}

impl PaymentProcessor for SandboxProcessor {
    fn create_intent(
        &self,
        _amount_cents: u64,
        _currency: &str,
        _metadata: &BTreeMap<String, String>,
    ) -> Result<IntentHandle, ProcessorError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        Ok(IntentHandle {
            intent_id: format!("pi_sandbox_{id:06}"),
            client_secret: format!("pi_sandbox_{id:06}_secret"),
        })
    }

    fn retrieve_intent(&self, intent_id: &str) -> Result<IntentStatus, ProcessorError> {
        Ok(IntentStatus::Succeeded {
            charge_ref: format!("ch_{intent_id}"),
        })
    }

    fn create_refund(
        &self,
        _charge_ref: &str,
        _amount_cents: u64,
    ) -> Result<String, ProcessorError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        Ok(format!("re_sandbox_{id:06}"))
    }

    fn create_checkout_session(
        &self,
        _line_items: &[CheckoutLineItem],
        _mode: CheckoutMode,
        customer: &str,
    ) -> Result<String, ProcessorError> {
        Ok(format!("https://checkout.sandbox.example/{customer}"))
    }
}
