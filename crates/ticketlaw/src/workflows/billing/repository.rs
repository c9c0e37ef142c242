use super::business::{BusinessAccount, BusinessInvoice, MonthlyUsage};
use super::domain::{BusinessId, Invoice, PaymentId, PaymentRecord};
use crate::workflows::cases::domain::{LawyerId, UserId};

/// Error enumeration for ledger storage failures.
#[derive(Debug, thiserror::Error)]
pub enum LedgerRepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("ledger repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction over the payment ledger.
pub trait PaymentRepository: Send + Sync {
    fn insert(&self, payment: PaymentRecord) -> Result<PaymentRecord, LedgerRepositoryError>;
    fn update(&self, payment: PaymentRecord) -> Result<(), LedgerRepositoryError>;
    fn fetch(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, LedgerRepositoryError>;
    fn for_user(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>, LedgerRepositoryError>;
    fn for_lawyer(
        &self,
        lawyer_id: &LawyerId,
    ) -> Result<Vec<PaymentRecord>, LedgerRepositoryError>;
    fn all(&self) -> Result<Vec<PaymentRecord>, LedgerRepositoryError>;
}

/// Storage abstraction over issued ad-hoc invoices.
pub trait InvoiceRepository: Send + Sync {
    fn insert(&self, invoice: Invoice) -> Result<Invoice, LedgerRepositoryError>;
    fn for_user(&self, user_id: &UserId) -> Result<Vec<Invoice>, LedgerRepositoryError>;
}

/// Storage abstraction over B2B accounts and their billing artifacts.
pub trait BusinessRepository: Send + Sync {
    fn insert(&self, account: BusinessAccount)
        -> Result<BusinessAccount, LedgerRepositoryError>;
    fn update(&self, account: BusinessAccount) -> Result<(), LedgerRepositoryError>;
    fn fetch(&self, id: &BusinessId) -> Result<Option<BusinessAccount>, LedgerRepositoryError>;
    fn fetch_by_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<BusinessAccount>, LedgerRepositoryError>;

    fn usage_for(
        &self,
        id: &BusinessId,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlyUsage>, LedgerRepositoryError>;
    fn record_invoice(
        &self,
        invoice: BusinessInvoice,
    ) -> Result<BusinessInvoice, LedgerRepositoryError>;
    fn billing_history(
        &self,
        id: &BusinessId,
    ) -> Result<Vec<BusinessInvoice>, LedgerRepositoryError>;
}
