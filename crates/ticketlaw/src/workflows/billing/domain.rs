use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::cases::domain::{CaseId, LawyerId, UserId};

/// Identifier wrapper for ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub String);

/// Identifier wrapper for B2B subscriber accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusinessId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    CasePayment,
    Subscription,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

/// The marketplace's cut of a completed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFee {
    pub amount_cents: u64,
    pub percentage: u8,
}

/// The remainder owed to the representing lawyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawyerPayout {
    pub amount_cents: u64,
    pub status: PayoutStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub amount_cents: u64,
    pub reason: String,
    pub status: RefundStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// One ledger entry per billable case event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub transaction_id: String,
    pub case_number: CaseId,
    pub user_id: UserId,
    pub lawyer_id: Option<LawyerId>,
    pub amount_cents: u64,
    pub currency: String,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub intent_ref: Option<String>,
    pub charge_ref: Option<String>,
    pub refund_ref: Option<String>,
    pub platform_fee: Option<PlatformFee>,
    pub lawyer_payout: Option<LawyerPayout>,
    pub refund: Option<RefundRecord>,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn is_refunded(&self) -> bool {
        self.status == PaymentStatus::Refunded
    }
}

/// A single billed line on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal_cents: u64,
    pub tax_cents: u64,
    pub total_cents: u64,
}

/// Ad-hoc invoice issued by the back office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_number: String,
    pub user_id: UserId,
    pub lawyer_id: Option<LawyerId>,
    pub case_number: Option<CaseId>,
    pub line_items: Vec<InvoiceLineItem>,
    pub tax_percentage: u8,
    pub discount_cents: u64,
    pub totals: InvoiceTotals,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}
