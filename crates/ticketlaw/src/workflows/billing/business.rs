//! B2B subscriber accounts: plans, metered usage, monthly invoicing, and
//! idempotent webhook reconciliation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{BusinessId, InvoiceTotals};
use super::fees;
use super::processor::ProcessorEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessPlan {
    pub name: String,
    pub monthly_price_cents: u64,
    pub setup_fee_cents: u64,
    pub included_fines: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingState {
    Active,
    PastDue,
    Cancelled,
}

/// A company-level subscriber billed separately from individual cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessAccount {
    pub business_id: BusinessId,
    pub name: String,
    pub plan: BusinessPlan,
    pub subscription_ref: Option<String>,
    pub billing: BillingState,
}

/// Metered usage for one billing period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyUsage {
    pub business_id: BusinessId,
    pub year: i32,
    pub month: u32,
    pub fines_submitted: u32,
    pub extra_fines_count: u32,
    pub extra_fines_cost_cents: u64,
}

/// Invoice issued to a business for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessInvoice {
    pub invoice_number: String,
    pub business_id: BusinessId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub plan_fee_cents: u64,
    pub setup_fee_cents: u64,
    pub extra_fines_count: u32,
    pub extra_fines_cost_cents: u64,
    pub totals: InvoiceTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("event references subscription '{event}' but account holds '{account}'")]
    SubscriptionMismatch { event: String, account: String },
    #[error("invalid billing period {year}-{month}")]
    InvalidPeriod { year: i32, month: u32 },
}

/// Result of replay-safe event application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    /// The event had already been folded in; nothing changed.
    AlreadyApplied,
}

impl BusinessAccount {
    /// Fold a processor webhook event into the account.
    ///
    /// Replayed deliveries return `AlreadyApplied` without touching state,
    /// so the webhook endpoint can acknowledge duplicates safely.
    pub fn reconcile(&mut self, event: &ProcessorEvent) -> Result<ReconcileOutcome, ReconcileError> {
        match event {
            ProcessorEvent::CheckoutSessionCompleted {
                subscription_ref, ..
            } => match &self.subscription_ref {
                None => {
                    self.subscription_ref = Some(subscription_ref.clone());
                    self.billing = BillingState::Active;
                    Ok(ReconcileOutcome::Applied)
                }
                Some(existing) if existing == subscription_ref => {
                    Ok(ReconcileOutcome::AlreadyApplied)
                }
                Some(existing) => Err(ReconcileError::SubscriptionMismatch {
                    event: subscription_ref.clone(),
                    account: existing.clone(),
                }),
            },
            ProcessorEvent::InvoicePaymentFailed { subscription_ref } => {
                self.check_subscription(subscription_ref)?;
                self.move_billing(BillingState::PastDue)
            }
            ProcessorEvent::InvoicePaymentSucceeded { subscription_ref } => {
                self.check_subscription(subscription_ref)?;
                self.move_billing(BillingState::Active)
            }
            ProcessorEvent::SubscriptionDeleted { subscription_ref } => {
                self.check_subscription(subscription_ref)?;
                self.move_billing(BillingState::Cancelled)
            }
        }
    }

    fn check_subscription(&self, subscription_ref: &str) -> Result<(), ReconcileError> {
        match &self.subscription_ref {
            Some(existing) if existing == subscription_ref => Ok(()),
            Some(existing) => Err(ReconcileError::SubscriptionMismatch {
                event: subscription_ref.to_string(),
                account: existing.clone(),
            }),
            None => Err(ReconcileError::SubscriptionMismatch {
                event: subscription_ref.to_string(),
                account: "<none>".to_string(),
            }),
        }
    }

    fn move_billing(&mut self, next: BillingState) -> Result<ReconcileOutcome, ReconcileError> {
        if self.billing == next {
            return Ok(ReconcileOutcome::AlreadyApplied);
        }
        self.billing = next;
        Ok(ReconcileOutcome::Applied)
    }
}

/// Build the monthly invoice for one usage period.
pub fn build_monthly_invoice(
    account: &BusinessAccount,
    usage: &MonthlyUsage,
    vat_percent: u8,
) -> Result<BusinessInvoice, ReconcileError> {
    let period_start = NaiveDate::from_ymd_opt(usage.year, usage.month, 1).ok_or(
        ReconcileError::InvalidPeriod {
            year: usage.year,
            month: usage.month,
        },
    )?;
    let next_month = if usage.month == 12 {
        NaiveDate::from_ymd_opt(usage.year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(usage.year, usage.month + 1, 1)
    }
    .ok_or(ReconcileError::InvalidPeriod {
        year: usage.year,
        month: usage.month,
    })?;
    let period_end = next_month.pred_opt().unwrap_or(period_start);

    let totals = fees::business_invoice_totals(
        account.plan.monthly_price_cents,
        account.plan.setup_fee_cents,
        usage.extra_fines_cost_cents,
        vat_percent,
    );

    let short_id: String = account.business_id.0.chars().take(8).collect();
    Ok(BusinessInvoice {
        invoice_number: format!("INV-{short_id}-{}{:02}", usage.year, usage.month),
        business_id: account.business_id.clone(),
        period_start,
        period_end,
        plan_fee_cents: account.plan.monthly_price_cents,
        setup_fee_cents: account.plan.setup_fee_cents,
        extra_fines_count: usage.extra_fines_count,
        extra_fines_cost_cents: usage.extra_fines_cost_cents,
        totals,
    })
}
