//! # Invoice Calculator
//!
//! Derives invoice amounts and owns the invoice status lifecycle.
//!
//! ## Formula
//! ```text
//! final_amount = subtotal - offer_discount - points_discount
//! tax_amount   = final_amount × tax_rate        (half-up, minor units)
//! amount_due   = final_amount + tax_amount
//! ```
//!
//! Status moves here never touch money. Wallet and points ledgers move
//! money before or after the status change.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Rate};
use crate::types::{Invoice, InvoiceStatus};

/// Amounts stored on an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InvoiceAmounts {
    pub subtotal: Money,
    pub offer_discount: Money,
    pub points_discount: Money,
    pub total_discount: Money,
    pub final_amount: Money,
    pub tax_amount: Money,
    pub amount_due: Money,
}

/// Computes invoice amounts.
///
/// ## Example
/// ```rust
/// use souq_core::invoice::calculate_amounts;
/// use souq_core::money::{Money, Rate};
///
/// let amounts = calculate_amounts(
///     Money::from_minor(20_000),
///     Money::from_minor(5_000),
///     Money::zero(),
///     Rate::from_bps(1500),
/// );
/// assert_eq!(amounts.tax_amount, Money::from_minor(2_250));
/// assert_eq!(amounts.amount_due, Money::from_minor(17_250));
/// ```
pub fn calculate_amounts(
    subtotal: Money,
    offer_discount: Money,
    points_discount: Money,
    tax_rate: Rate,
) -> InvoiceAmounts {
    let total_discount = offer_discount + points_discount;
    let final_amount = subtotal - total_discount;
    let tax_amount = final_amount.percentage(tax_rate);

    InvoiceAmounts {
        subtotal,
        offer_discount,
        points_discount,
        total_discount,
        final_amount,
        tax_amount,
        amount_due: final_amount + tax_amount,
    }
}

/// Invoice number for an order: `INV-{order_number}`.
pub fn invoice_number(order_number: &str) -> String {
    format!("INV-{order_number}")
}

fn transition(invoice: &mut Invoice, next: InvoiceStatus, now: DateTime<Utc>) -> CoreResult<()> {
    if !invoice.status.can_transition_to(next) {
        return Err(CoreError::invalid_transition(
            "Invoice",
            invoice.status,
            next,
        ));
    }
    invoice.status = next;
    invoice.updated_at = now;
    Ok(())
}

/// `pending → paid`, stamping `paid_at`.
pub fn mark_paid(invoice: &mut Invoice, now: DateTime<Utc>) -> CoreResult<()> {
    transition(invoice, InvoiceStatus::Paid, now)?;
    invoice.paid_at = Some(now);
    Ok(())
}

/// `paid → pending`, clearing `paid_at`.
pub fn mark_unpaid(invoice: &mut Invoice, now: DateTime<Utc>) -> CoreResult<()> {
    transition(invoice, InvoiceStatus::Pending, now)?;
    invoice.paid_at = None;
    Ok(())
}

pub fn mark_cancelled(invoice: &mut Invoice, now: DateTime<Utc>) -> CoreResult<()> {
    transition(invoice, InvoiceStatus::Cancelled, now)
}

pub fn mark_refunded(invoice: &mut Invoice, now: DateTime<Utc>) -> CoreResult<()> {
    transition(invoice, InvoiceStatus::Refunded, now)
}

/// Copies recomputed amounts onto an invoice.
pub fn apply_amounts(invoice: &mut Invoice, amounts: &InvoiceAmounts, used_points: i64) {
    invoice.subtotal = amounts.subtotal;
    invoice.offer_discount = amounts.offer_discount;
    invoice.points_discount = amounts.points_discount;
    invoice.total_discount = amounts.total_discount;
    invoice.tax_amount = amounts.tax_amount;
    invoice.amount_due = amounts.amount_due;
    invoice.used_points = used_points;
}

/// Remaining balance once `paid` has been collected; zero when covered.
pub fn shortfall(amount_due: Money, paid: Money) -> Money {
    amount_due.saturating_sub_to_zero(paid)
}
