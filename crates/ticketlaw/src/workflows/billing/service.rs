use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::business::{build_monthly_invoice, BusinessInvoice, ReconcileError, ReconcileOutcome};
use super::domain::{
    BusinessId, Invoice, InvoiceLineItem, LawyerPayout, PaymentId, PaymentKind, PaymentRecord,
    PaymentStatus, PayoutStatus, PlatformFee, RefundRecord, RefundStatus,
};
use super::fees;
use super::processor::{
    CheckoutLineItem, CheckoutMode, IntentStatus, PaymentProcessor, ProcessorError,
    ProcessorEvent,
};
use super::repository::{
    BusinessRepository, InvoiceRepository, LedgerRepositoryError, PaymentRepository,
};
use crate::access::{Actor, Capability, Role};
use crate::config::BillingConfig;
use crate::http::ErrorKind;
use crate::workflows::cases::domain::{
    CaseId, CasePaymentStatus, CaseStatus, OutcomeType, UserId,
};
use crate::workflows::cases::lifecycle::{transition_allowed, LifecycleError};
use crate::workflows::cases::repository::{
    CaseRepository, LawyerRepository, RepositoryError as CaseRepositoryError,
};

static PAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static INVOICE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_payment_id() -> (PaymentId, String) {
    let id = PAYMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    (PaymentId(format!("pay-{id:06}")), format!("TXN-{id:06}"))
}

fn next_invoice_number() -> String {
    let id = INVOICE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("INV-{id:06}")
}

/// Error raised by the payment ledger services.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("case already paid")]
    AlreadyPaid,
    #[error("payment already refunded")]
    AlreadyRefunded,
    #[error("payment has not succeeded at the processor")]
    PaymentNotSuccessful,
    #[error("payment has no processor intent to confirm")]
    MissingIntent,
    #[error("payment has no settled charge to refund")]
    MissingCharge,
    #[error("no refund has been requested for this payment")]
    NoRefundRequested,
    #[error("refund is not approved for processing")]
    RefundNotApproved,
    #[error("refund amount exceeds the payment amount")]
    RefundExceedsPayment,
    #[error("payout already processed or not eligible")]
    PayoutNotEligible,
    #[error("lawyer bank details not found")]
    MissingBankDetails,
    #[error("invoice requires at least one line item")]
    EmptyInvoice,
    #[error("not authorized for this payment operation")]
    NotAuthorized,
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error(transparent)]
    Ledger(#[from] LedgerRepositoryError),
    #[error(transparent)]
    Cases(#[from] CaseRepositoryError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl BillingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::AlreadyPaid | BillingError::AlreadyRefunded => ErrorKind::Conflict,
            BillingError::PaymentNotSuccessful
            | BillingError::MissingIntent
            | BillingError::MissingCharge
            | BillingError::NoRefundRequested
            | BillingError::RefundNotApproved
            | BillingError::RefundExceedsPayment
            | BillingError::PayoutNotEligible
            | BillingError::MissingBankDetails
            | BillingError::EmptyInvoice
            | BillingError::Reconcile(_)
            | BillingError::Lifecycle(LifecycleError::InvalidTransition { .. })
            | BillingError::Lifecycle(LifecycleError::RatingOutOfRange(_)) => {
                ErrorKind::Validation
            }
            BillingError::Lifecycle(LifecycleError::AlreadyRated) => ErrorKind::Conflict,
            BillingError::NotAuthorized => ErrorKind::Authorization,
            BillingError::Processor(_) => ErrorKind::ExternalService,
            BillingError::Ledger(LedgerRepositoryError::NotFound)
            | BillingError::Cases(CaseRepositoryError::NotFound) => ErrorKind::NotFound,
            BillingError::Ledger(LedgerRepositoryError::Conflict)
            | BillingError::Cases(
                CaseRepositoryError::Conflict | CaseRepositoryError::CapacityExhausted,
            ) => ErrorKind::Conflict,
            BillingError::Ledger(LedgerRepositoryError::Unavailable(_))
            | BillingError::Cases(CaseRepositoryError::Unavailable(_)) => ErrorKind::Server,
        }
    }
}

/// Receipt handed back when an intent is opened.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct IntentReceipt {
    pub payment: PaymentRecord,
    pub client_secret: String,
}

/// Service owning the case-payment ledger: intents, confirmation, refunds,
/// and lawyer payouts.
pub struct BillingService<P, C, L, X> {
    payments: Arc<P>,
    cases: Arc<C>,
    lawyers: Arc<L>,
    processor: Arc<X>,
    config: BillingConfig,
}

impl<P, C, L, X> BillingService<P, C, L, X>
where
    P: PaymentRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    X: PaymentProcessor + 'static,
{
    pub fn new(
        payments: Arc<P>,
        cases: Arc<C>,
        lawyers: Arc<L>,
        processor: Arc<X>,
        config: BillingConfig,
    ) -> Self {
        Self {
            payments,
            cases,
            lawyers,
            processor,
            config,
        }
    }

    /// Open a payment intent for a case's quoted price.
    pub fn create_intent(
        &self,
        case_id: &CaseId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<IntentReceipt, BillingError> {
        let case = self
            .cases
            .fetch(case_id)?
            .ok_or(CaseRepositoryError::NotFound)?;

        if case.user_id != actor.user_id && actor.role != Role::Admin {
            return Err(BillingError::NotAuthorized);
        }
        if case.is_paid() {
            return Err(BillingError::AlreadyPaid);
        }

        let amount_cents = case.pricing.quoted_cents;
        let mut metadata = BTreeMap::new();
        metadata.insert("case_number".to_string(), case.case_number.0.clone());
        metadata.insert("user_id".to_string(), case.user_id.0.clone());

        let handle = self.processor.create_intent(amount_cents, "usd", &metadata)?;

        let (payment_id, transaction_id) = next_payment_id();
        let payment = PaymentRecord {
            payment_id,
            transaction_id,
            case_number: case.case_number.clone(),
            user_id: case.user_id.clone(),
            lawyer_id: case.lawyer_id.clone(),
            amount_cents,
            currency: "usd".to_string(),
            kind: PaymentKind::CasePayment,
            status: PaymentStatus::Pending,
            intent_ref: Some(handle.intent_id.clone()),
            charge_ref: None,
            refund_ref: None,
            platform_fee: None,
            lawyer_payout: None,
            refund: None,
            created_at: now,
        };
        let payment = self.payments.insert(payment)?;

        Ok(IntentReceipt {
            payment,
            client_secret: handle.client_secret,
        })
    }

    /// Confirm a payment after the processor reports success: record the
    /// fee split and move the case into progress.
    pub fn confirm(
        &self,
        payment_id: &PaymentId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, BillingError> {
        let mut payment = self
            .payments
            .fetch(payment_id)?
            .ok_or(LedgerRepositoryError::NotFound)?;

        let intent_ref = payment
            .intent_ref
            .clone()
            .ok_or(BillingError::MissingIntent)?;
        let charge_ref = match self.processor.retrieve_intent(&intent_ref)? {
            IntentStatus::Succeeded { charge_ref } => charge_ref,
            IntentStatus::Processing | IntentStatus::Failed => {
                return Err(BillingError::PaymentNotSuccessful)
            }
        };

        // Validate the case transition before committing any ledger state.
        let mut case = self
            .cases
            .fetch(&payment.case_number)?
            .ok_or(CaseRepositoryError::NotFound)?;
        if !transition_allowed(case.status, CaseStatus::InProgress) {
            return Err(LifecycleError::InvalidTransition {
                from: case.status,
                to: CaseStatus::InProgress,
            }
            .into());
        }

        let split = fees::split_fee(payment.amount_cents, self.config.platform_fee_percent);
        payment.status = PaymentStatus::Completed;
        payment.charge_ref = Some(charge_ref);
        payment.platform_fee = Some(PlatformFee {
            amount_cents: split.platform_cents,
            percentage: self.config.platform_fee_percent,
        });
        payment.lawyer_payout = Some(LawyerPayout {
            amount_cents: split.payout_cents,
            status: PayoutStatus::Pending,
            paid_at: None,
        });
        self.payments.update(payment.clone())?;

        case.payment.status = CasePaymentStatus::Paid;
        case.payment.payment_id = Some(payment.payment_id.0.clone());
        case.payment.paid_at = Some(now);
        case.pricing.actual_cents = Some(payment.amount_cents);
        case.record_transition(
            CaseStatus::InProgress,
            "Payment received. Case is now in progress.",
            actor.user_id.clone(),
            now,
        )?;
        self.cases.update(case)?;

        info!(
            payment = %payment.payment_id.0,
            amount_cents = payment.amount_cents,
            fee_percent = self.config.platform_fee_percent,
            "payment confirmed and split"
        );
        Ok(payment)
    }

    /// Request a refund. A `guilty` case outcome auto-approves and processes
    /// immediately; everything else queues for admin review.
    pub fn request_refund(
        &self,
        payment_id: &PaymentId,
        reason: String,
        amount_cents: Option<u64>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, BillingError> {
        let mut payment = self
            .payments
            .fetch(payment_id)?
            .ok_or(LedgerRepositoryError::NotFound)?;

        if payment.user_id != actor.user_id && actor.role != Role::Admin {
            return Err(BillingError::NotAuthorized);
        }
        if payment.is_refunded() {
            return Err(BillingError::AlreadyRefunded);
        }

        let refund_cents = amount_cents.unwrap_or(payment.amount_cents);
        if refund_cents > payment.amount_cents {
            return Err(BillingError::RefundExceedsPayment);
        }

        let case = self
            .cases
            .fetch(&payment.case_number)?
            .ok_or(CaseRepositoryError::NotFound)?;
        let auto_approve = case
            .outcome
            .as_ref()
            .map(|outcome| outcome.outcome == OutcomeType::Guilty)
            .unwrap_or(false);

        payment.refund = Some(RefundRecord {
            amount_cents: refund_cents,
            reason,
            status: if auto_approve {
                RefundStatus::Approved
            } else {
                RefundStatus::Pending
            },
            requested_at: now,
            processed_at: None,
        });
        self.payments.update(payment.clone())?;

        if auto_approve {
            info!(payment = %payment.payment_id.0, "guilty outcome, refund auto-approved");
            return self.execute_refund(payment, actor, now);
        }

        Ok(payment)
    }

    /// Admin-triggered refund execution for a queued request.
    pub fn process_refund(
        &self,
        payment_id: &PaymentId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, BillingError> {
        if !actor.can(Capability::ProcessRefund) {
            return Err(BillingError::NotAuthorized);
        }

        let payment = self
            .payments
            .fetch(payment_id)?
            .ok_or(LedgerRepositoryError::NotFound)?;
        self.execute_refund(payment, actor, now)
    }

    /// Shared refund execution: processor first, ledger second, so a
    /// processor failure leaves every local field untouched.
    fn execute_refund(
        &self,
        mut payment: PaymentRecord,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, BillingError> {
        if payment.is_refunded() {
            return Err(BillingError::AlreadyRefunded);
        }

        let refund = payment
            .refund
            .clone()
            .ok_or(BillingError::NoRefundRequested)?;
        if !matches!(refund.status, RefundStatus::Approved | RefundStatus::Pending) {
            return Err(BillingError::RefundNotApproved);
        }
        let charge_ref = payment
            .charge_ref
            .clone()
            .ok_or(BillingError::MissingCharge)?;

        let refund_ref = self
            .processor
            .create_refund(&charge_ref, refund.amount_cents)?;

        payment.status = PaymentStatus::Refunded;
        payment.refund_ref = Some(refund_ref);
        payment.refund = Some(RefundRecord {
            status: RefundStatus::Completed,
            processed_at: Some(now),
            ..refund
        });
        self.payments.update(payment.clone())?;

        let mut case = self
            .cases
            .fetch(&payment.case_number)?
            .ok_or(CaseRepositoryError::NotFound)?;
        case.payment.status = CasePaymentStatus::Refunded;
        case.pricing.refund_cents = payment
            .refund
            .as_ref()
            .map(|refund| refund.amount_cents);
        case.record_transition(
            CaseStatus::Closed,
            "Refund processed due to unsuccessful case outcome.",
            actor.user_id.clone(),
            now,
        )?;
        self.cases.update(case)?;

        info!(payment = %payment.payment_id.0, "refund completed");
        Ok(payment)
    }

    /// Kick off the lawyer payout. The final `completed` transition belongs
    /// to the external payout integration.
    pub fn process_payout(
        &self,
        payment_id: &PaymentId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, BillingError> {
        if !actor.can(Capability::ProcessPayout) {
            return Err(BillingError::NotAuthorized);
        }

        let mut payment = self
            .payments
            .fetch(payment_id)?
            .ok_or(LedgerRepositoryError::NotFound)?;

        let mut payout = payment
            .lawyer_payout
            .clone()
            .ok_or(BillingError::PayoutNotEligible)?;
        if payout.status != PayoutStatus::Pending {
            return Err(BillingError::PayoutNotEligible);
        }

        let lawyer_id = payment
            .lawyer_id
            .clone()
            .ok_or(BillingError::MissingBankDetails)?;
        let lawyer = self
            .lawyers
            .fetch(&lawyer_id)?
            .ok_or(CaseRepositoryError::NotFound)?;
        if lawyer.bank_details.is_none() {
            return Err(BillingError::MissingBankDetails);
        }

        payout.status = PayoutStatus::Processing;
        payout.paid_at = Some(now);
        payment.lawyer_payout = Some(payout);
        self.payments.update(payment.clone())?;

        info!(payment = %payment.payment_id.0, lawyer = %lawyer_id.0, "payout initiated");
        Ok(payment)
    }

    /// Payment history scoped by role: defendants see their own, lawyers
    /// their docket's, admins everything.
    pub fn history(&self, actor: &Actor) -> Result<Vec<PaymentRecord>, BillingError> {
        if actor.can(Capability::ViewAllPayments) {
            return Ok(self.payments.all()?);
        }
        if actor.role == Role::Lawyer {
            if let Some(lawyer) = self.lawyers.fetch_by_user(&actor.user_id)? {
                return Ok(self.payments.for_lawyer(&lawyer.lawyer_id)?);
            }
        }
        Ok(self.payments.for_user(&actor.user_id)?)
    }
}

/// Ad-hoc invoice issuance payload.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueInvoiceRequest {
    pub user_id: UserId,
    pub lawyer_id: Option<crate::workflows::cases::domain::LawyerId>,
    pub case_number: Option<CaseId>,
    pub line_items: Vec<InvoiceLineItem>,
    #[serde(default)]
    pub tax_percentage: u8,
    #[serde(default)]
    pub discount_cents: u64,
    pub notes: Option<String>,
}

/// Back-office invoice service.
pub struct InvoiceService<I> {
    invoices: Arc<I>,
}

impl<I> InvoiceService<I>
where
    I: InvoiceRepository + 'static,
{
    pub fn new(invoices: Arc<I>) -> Self {
        Self { invoices }
    }

    pub fn issue(
        &self,
        request: IssueInvoiceRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Invoice, BillingError> {
        if !actor.can(Capability::IssueInvoices) && actor.user_id != request.user_id {
            return Err(BillingError::NotAuthorized);
        }
        if request.line_items.is_empty() {
            return Err(BillingError::EmptyInvoice);
        }

        let totals = fees::invoice_totals(
            &request.line_items,
            request.tax_percentage,
            request.discount_cents,
        );
        let invoice = Invoice {
            invoice_number: next_invoice_number(),
            user_id: request.user_id,
            lawyer_id: request.lawyer_id,
            case_number: request.case_number,
            line_items: request.line_items,
            tax_percentage: request.tax_percentage,
            discount_cents: request.discount_cents,
            totals,
            due_date: (now + Duration::days(30)).date_naive(),
            notes: request.notes,
        };
        Ok(self.invoices.insert(invoice)?)
    }

    pub fn for_user(&self, user_id: &UserId) -> Result<Vec<Invoice>, BillingError> {
        Ok(self.invoices.for_user(user_id)?)
    }
}

/// B2B subscription billing: monthly invoices, checkout sessions, webhook
/// reconciliation.
pub struct BusinessBillingService<B, X> {
    businesses: Arc<B>,
    processor: Arc<X>,
    config: BillingConfig,
}

impl<B, X> BusinessBillingService<B, X>
where
    B: BusinessRepository + 'static,
    X: PaymentProcessor + 'static,
{
    pub fn new(businesses: Arc<B>, processor: Arc<X>, config: BillingConfig) -> Self {
        Self {
            businesses,
            processor,
            config,
        }
    }

    /// Issue the invoice for one usage month.
    pub fn create_monthly_invoice(
        &self,
        business_id: &BusinessId,
        year: i32,
        month: u32,
        actor: &Actor,
    ) -> Result<BusinessInvoice, BillingError> {
        if !actor.can(Capability::ManageBusinessBilling) {
            return Err(BillingError::NotAuthorized);
        }

        let account = self
            .businesses
            .fetch(business_id)?
            .ok_or(LedgerRepositoryError::NotFound)?;
        let usage = self
            .businesses
            .usage_for(business_id, year, month)?
            .ok_or(LedgerRepositoryError::NotFound)?;

        let invoice = build_monthly_invoice(&account, &usage, self.config.vat_percent)?;
        Ok(self.businesses.record_invoice(invoice)?)
    }

    pub fn billing_history(
        &self,
        business_id: &BusinessId,
        actor: &Actor,
    ) -> Result<Vec<BusinessInvoice>, BillingError> {
        if !actor.can(Capability::ManageBusinessBilling) {
            return Err(BillingError::NotAuthorized);
        }
        Ok(self.businesses.billing_history(business_id)?)
    }

    /// Open a subscription checkout session for a business account.
    pub fn checkout(
        &self,
        business_id: &BusinessId,
        actor: &Actor,
    ) -> Result<String, BillingError> {
        if !actor.can(Capability::ManageBusinessBilling) {
            return Err(BillingError::NotAuthorized);
        }

        let account = self
            .businesses
            .fetch(business_id)?
            .ok_or(LedgerRepositoryError::NotFound)?;

        let mut line_items = vec![CheckoutLineItem {
            description: format!("{} plan", account.plan.name),
            quantity: 1,
            unit_amount_cents: account.plan.monthly_price_cents,
        }];
        if account.plan.setup_fee_cents > 0 {
            line_items.push(CheckoutLineItem {
                description: "One-time setup".to_string(),
                quantity: 1,
                unit_amount_cents: account.plan.setup_fee_cents,
            });
        }

        Ok(self.processor.create_checkout_session(
            &line_items,
            CheckoutMode::Subscription,
            &account.business_id.0,
        )?)
    }

    /// Fold one webhook event into the owning business account.
    pub fn reconcile(&self, event: &ProcessorEvent) -> Result<ReconcileOutcome, BillingError> {
        let mut account = match event {
            ProcessorEvent::CheckoutSessionCompleted { business_id, .. } => self
                .businesses
                .fetch(&BusinessId(business_id.clone()))?
                .ok_or(LedgerRepositoryError::NotFound)?,
            ProcessorEvent::InvoicePaymentFailed { subscription_ref }
            | ProcessorEvent::InvoicePaymentSucceeded { subscription_ref }
            | ProcessorEvent::SubscriptionDeleted { subscription_ref } => self
                .businesses
                .fetch_by_subscription(subscription_ref)?
                .ok_or(LedgerRepositoryError::NotFound)?,
        };

        let outcome = account.reconcile(event)?;
        if outcome == ReconcileOutcome::Applied {
            self.businesses.update(account)?;
        } else {
            warn!(?event, "duplicate webhook delivery ignored");
        }
        Ok(outcome)
    }
}
