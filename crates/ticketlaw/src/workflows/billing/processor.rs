//! Outbound port to the payment processor.
//!
//! The processor's own internals (card handling, settlement) stay outside
//! this crate; the ledger only depends on this narrow surface and on the
//! webhook events it emits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Processor dispatch error. Any variant aborts the in-progress ledger
/// operation before local state changes.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("payment processor unavailable: {0}")]
    Unavailable(String),
    #[error("payment processor rejected the request: {0}")]
    Rejected(String),
}

/// Opaque handle returned when an intent is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentHandle {
    pub intent_id: String,
    pub client_secret: String,
}

/// Processor-side view of an intent when queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded { charge_ref: String },
    Processing,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    Payment,
    Subscription,
}

/// A single checkout line item, already priced in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub description: String,
    pub quantity: u32,
    pub unit_amount_cents: u64,
}

pub trait PaymentProcessor: Send + Sync {
    fn create_intent(
        &self,
        amount_cents: u64,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<IntentHandle, ProcessorError>;

    fn retrieve_intent(&self, intent_id: &str) -> Result<IntentStatus, ProcessorError>;

    fn create_refund(&self, charge_ref: &str, amount_cents: u64)
        -> Result<String, ProcessorError>;

    fn create_checkout_session(
        &self,
        line_items: &[CheckoutLineItem],
        mode: CheckoutMode,
        customer: &str,
    ) -> Result<String, ProcessorError>;
}

/// Asynchronous webhook events the ledger reconciles idempotently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessorEvent {
    CheckoutSessionCompleted {
        business_id: String,
        subscription_ref: String,
    },
    InvoicePaymentFailed {
        subscription_ref: String,
    },
    InvoicePaymentSucceeded {
        subscription_ref: String,
    },
    SubscriptionDeleted {
        subscription_ref: String,
    },
}
