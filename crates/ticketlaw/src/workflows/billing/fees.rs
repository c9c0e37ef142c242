//! Fee-split and invoice arithmetic, in integer cents.

use super::domain::{InvoiceLineItem, InvoiceTotals};

/// Round-half-up percentage of an amount.
pub(crate) fn percent_of(amount_cents: u64, percent: u8) -> u64 {
    (amount_cents * u64::from(percent) + 50) / 100
}

/// A completed payment split between the platform and the lawyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub platform_cents: u64,
    pub payout_cents: u64,
}

/// Split a payment at the configured platform percentage.
///
/// The payout is the exact remainder, so
/// `platform_cents + payout_cents == amount_cents` always holds.
pub fn split_fee(amount_cents: u64, percent: u8) -> FeeSplit {
    let platform_cents = percent_of(amount_cents, percent);
    FeeSplit {
        platform_cents,
        payout_cents: amount_cents - platform_cents,
    }
}

/// Invoice totals: line items, then tax, minus any discount.
pub fn invoice_totals(
    line_items: &[InvoiceLineItem],
    tax_percentage: u8,
    discount_cents: u64,
) -> InvoiceTotals {
    let subtotal_cents: u64 = line_items
        .iter()
        .map(|item| u64::from(item.quantity) * item.unit_price_cents)
        .sum();
    let tax_cents = percent_of(subtotal_cents, tax_percentage);
    InvoiceTotals {
        subtotal_cents,
        tax_cents,
        total_cents: (subtotal_cents + tax_cents).saturating_sub(discount_cents),
    }
}

/// Monthly B2B invoice: plan fee + setup fee + metered overage, plus VAT.
pub fn business_invoice_totals(
    plan_fee_cents: u64,
    setup_fee_cents: u64,
    extra_fines_cost_cents: u64,
    vat_percent: u8,
) -> InvoiceTotals {
    let subtotal_cents = plan_fee_cents + setup_fee_cents + extra_fines_cost_cents;
    let tax_cents = percent_of(subtotal_cents, vat_percent);
    InvoiceTotals {
        subtotal_cents,
        tax_cents,
        total_cents: subtotal_cents + tax_cents,
    }
}
