//! Payment ledger workflow: fee splits, refunds, payouts, invoices, and B2B
//! subscription billing.

pub mod business;
pub mod domain;
pub mod fees;
pub mod processor;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use business::{
    build_monthly_invoice, BillingState, BusinessAccount, BusinessInvoice, BusinessPlan,
    MonthlyUsage, ReconcileError, ReconcileOutcome,
};
pub use domain::{
    BusinessId, Invoice, InvoiceLineItem, InvoiceTotals, LawyerPayout, PaymentId, PaymentKind,
    PaymentRecord, PaymentStatus, PayoutStatus, PlatformFee, RefundRecord, RefundStatus,
};
pub use fees::{business_invoice_totals, invoice_totals, split_fee, FeeSplit};
pub use processor::{
    CheckoutLineItem, CheckoutMode, IntentHandle, IntentStatus, PaymentProcessor, ProcessorError,
    ProcessorEvent,
};
pub use repository::{
    BusinessRepository, InvoiceRepository, LedgerRepositoryError, PaymentRepository,
};
pub use router::{business_router, invoice_router, payment_router};
pub use service::{
    BillingError, BillingService, BusinessBillingService, IntentReceipt, InvoiceService,
    IssueInvoiceRequest,
};
