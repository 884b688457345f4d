//! # Payment Reconciliation
//!
//! Settles gateway callbacks exactly once. The success redirect and the
//! webhook can both arrive for one capture, in any order and any number of
//! times; every entry point funnels into the same upsert.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reference WCH-…?  ──yes──▶ wallet top-up: credit amount + bonus once   │
//! │        │ no                                                             │
//! │        ▼                                                                │
//! │  order by number, else bounded numeric id    (none → Unresolved)        │
//! │  invoice of the order                        (none → Unresolved)        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  payment by any receipt / transaction / gateway payment id, or the     │
//! │  latest online payment when the callback carries none                   │
//! │        │                           ── settled ──▶ Duplicate             │
//! │        │ missing / pending                                              │
//! │        ▼                                                                │
//! │  else latest pending online payment  ── found ──▶ update in place       │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  insert (UNIQUE(invoice_id, receipt_id) collision → Duplicate)          │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Σ completed ≥ amount_due  →  invoice paid                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use souq_core::gateway::GatewayCallbackPayload;
use souq_core::invoice::{mark_paid, shortfall};
use souq_core::numbering::{is_wallet_charge, OrderReference};
use souq_core::wallet::top_up_credit;
use souq_core::{
    CoreError, Invoice, InvoiceStatus, Order, Payment, PaymentMethod, PaymentStatus,
};
use souq_db::{
    Conn, DbError, DbResult, InvoiceRepository, NewPayment, OrderRepository, PaymentRepository,
};

use crate::activity::Activity;
use crate::context::EngineContext;
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::invoice::InvoiceService;
use crate::numbering::next_payment_number;
use crate::wallet::WalletLedger;

/// What a callback did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// The payment row was written. `invoice` is `None` for wallet top-ups.
    Applied {
        payment: Payment,
        invoice: Option<Invoice>,
    },
    /// The callback was already settled; nothing changed.
    Duplicate { payment: Payment },
    /// No order, invoice or top-up matches the reference.
    Unresolved { reference: Option<String> },
}

impl ReconciliationOutcome {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, ReconciliationOutcome::Unresolved { .. })
    }

    pub fn payment(&self) -> Option<&Payment> {
        match self {
            ReconciliationOutcome::Applied { payment, .. }
            | ReconciliationOutcome::Duplicate { payment } => Some(payment),
            ReconciliationOutcome::Unresolved { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationService {
    ctx: EngineContext,
}

impl ReconciliationService {
    pub fn new(ctx: EngineContext) -> Self {
        ReconciliationService { ctx }
    }

    /// Success redirect from the gateway.
    pub async fn handle_success(
        &self,
        payload: &GatewayCallbackPayload,
    ) -> FulfillmentResult<ReconciliationOutcome> {
        self.reconcile(payload, payload.status(), "success").await
    }

    /// Asynchronous gateway notification.
    pub async fn handle_webhook(
        &self,
        payload: &GatewayCallbackPayload,
    ) -> FulfillmentResult<ReconciliationOutcome> {
        self.reconcile(payload, payload.status(), "webhook").await
    }

    /// Cancel redirect. Whatever the payload says, the attempt failed.
    pub async fn handle_cancel(
        &self,
        payload: &GatewayCallbackPayload,
    ) -> FulfillmentResult<ReconciliationOutcome> {
        self.reconcile(payload, PaymentStatus::Failed, "cancel").await
    }

    async fn reconcile(
        &self,
        payload: &GatewayCallbackPayload,
        status: PaymentStatus,
        channel: &'static str,
    ) -> FulfillmentResult<ReconciliationOutcome> {
        let Some(reference) = payload.order_reference.clone() else {
            warn!(channel, "Gateway callback without an order reference");
            return Ok(ReconciliationOutcome::Unresolved { reference: None });
        };
        debug!(channel, reference = %reference, status = %status, "Reconciling gateway callback");

        let now = Utc::now();
        let mut tx = self.ctx.db.begin().await?;

        let outcome = if is_wallet_charge(&reference) {
            self.settle_wallet_charge(&mut tx, &reference, payload, status, now).await?
        } else {
            self.settle_order_payment(&mut tx, &reference, payload, status, now).await?
        };

        if let ReconciliationOutcome::Applied { payment, .. } = &outcome {
            tx.commit().await?;
            info!(
                channel,
                reference = %reference,
                payment_number = %payment.payment_number,
                status = %payment.status,
                amount = %payment.amount,
                "Gateway callback applied"
            );
            let action = match payment.status {
                PaymentStatus::Completed => "payment_captured",
                PaymentStatus::Failed => "payment_failed",
                _ => "payment_updated",
            };
            self.ctx.record(Activity::new(
                action,
                "payment",
                payment.id,
                format!("{} via {channel} for {reference}", payment.payment_number),
            ));
        }

        Ok(outcome)
    }

    async fn settle_order_payment(
        &self,
        conn: &mut Conn,
        reference: &str,
        payload: &GatewayCallbackPayload,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> FulfillmentResult<ReconciliationOutcome> {
        let Some(order) = resolve_order(conn, reference).await? else {
            warn!(reference, "Gateway callback for unknown order");
            return Ok(ReconciliationOutcome::Unresolved {
                reference: Some(reference.to_string()),
            });
        };
        let Some(mut invoice) = InvoiceRepository::find_by_order(conn, order.id).await? else {
            warn!(reference, order_id = order.id, "Gateway callback for order without invoice");
            return Ok(ReconciliationOutcome::Unresolved {
                reference: Some(reference.to_string()),
            });
        };

        let ids = payload.gateway_ids();
        let receipt = payload.receipt_key();
        let by_id = if ids.is_empty() {
            // nothing to match on: the latest online attempt is this callback's
            PaymentRepository::find_most_recent(conn, invoice.id, PaymentMethod::Online).await?
        } else {
            PaymentRepository::find_by_gateway_ids(conn, invoice.id, PaymentMethod::Online, &ids).await?
        };
        if let Some(existing) = &by_id {
            if already_settled(existing.status, status, !ids.is_empty()) {
                debug!(reference, receipt, "Callback already settled");
                return Ok(ReconciliationOutcome::Duplicate {
                    payment: existing.clone(),
                });
            }
        }

        let target = match by_id {
            Some(payment) => Some(payment),
            None => PaymentRepository::find_latest_pending(conn, invoice.id, PaymentMethod::Online).await?,
        };

        let written = match target {
            Some(mut payment) => {
                if let Some(amount) = payload.amount {
                    payment.amount = amount;
                }
                stamp(&mut payment, payload, status, now);
                PaymentRepository::update(conn, &payment).await.map(|_| payment)
            }
            None => {
                let paid = PaymentRepository::sum_completed(conn, invoice.id).await?;
                let amount = payload
                    .amount
                    .unwrap_or_else(|| shortfall(invoice.amount_due, paid));
                let payment_number = next_payment_number(conn, now).await?;
                PaymentRepository::insert(
                    conn,
                    &NewPayment {
                        payment_number,
                        invoice_id: Some(invoice.id),
                        customer_id: order.customer_id,
                        reference: None,
                        amount,
                        method: PaymentMethod::Online,
                        status,
                        receipt_id: receipt.map(str::to_string),
                        transaction_id: payload.transaction_id.clone(),
                        gateway_payment_id: payload.payment_id.clone(),
                        track_id: payload.track_id.clone(),
                        payment_url: None,
                        paid_at: (status == PaymentStatus::Completed).then_some(now),
                    },
                )
                .await
            }
        };

        let payment = match written {
            Ok(payment) => payment,
            Err(DbError::UniqueViolation { .. }) => {
                return self.lost_race(conn, &invoice, &ids).await;
            }
            Err(e) => return Err(e.into()),
        };

        if payment.status == PaymentStatus::Completed {
            promote_invoice(conn, &order, &mut invoice, now).await?;
        }

        Ok(ReconciliationOutcome::Applied {
            payment,
            invoice: Some(invoice),
        })
    }

    /// Another callback stored the same receipt first; report its row.
    async fn lost_race(
        &self,
        conn: &mut Conn,
        invoice: &Invoice,
        ids: &[&str],
    ) -> FulfillmentResult<ReconciliationOutcome> {
        let winner = PaymentRepository::find_by_gateway_ids(conn, invoice.id, PaymentMethod::Online, ids).await?;
        let payment = winner.ok_or_else(|| {
            FulfillmentError::Database(DbError::Internal(format!(
                "receipt collision on invoice {} without a stored winner",
                invoice.id
            )))
        })?;
        info!(invoice_id = invoice.id, payment_id = payment.id, "Concurrent callback already stored this receipt");
        Ok(ReconciliationOutcome::Duplicate { payment })
    }

    async fn settle_wallet_charge(
        &self,
        conn: &mut Conn,
        reference: &str,
        payload: &GatewayCallbackPayload,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> FulfillmentResult<ReconciliationOutcome> {
        let Some(mut payment) = PaymentRepository::find_by_reference(conn, reference).await? else {
            warn!(reference, "Gateway callback for unknown wallet charge");
            return Ok(ReconciliationOutcome::Unresolved {
                reference: Some(reference.to_string()),
            });
        };
        if payment.status != PaymentStatus::Pending {
            debug!(reference, "Wallet charge already settled");
            return Ok(ReconciliationOutcome::Duplicate { payment });
        }

        if let Some(reported) = payload.amount {
            if reported != payment.amount {
                warn!(reference, stored = %payment.amount, reported = %reported, "Wallet charge amount mismatch; keeping stored amount");
            }
        }
        stamp(&mut payment, payload, status, now);
        PaymentRepository::update(conn, &payment).await?;

        if payment.status == PaymentStatus::Completed {
            let customer_id = payment
                .customer_id
                .ok_or_else(|| CoreError::not_found("Customer", format!("wallet charge {reference}")))?;
            let credit = top_up_credit(payment.amount, self.ctx.settings.wallet_bonus_rate());
            let balance = WalletLedger::credit(conn, customer_id, credit).await?;
            info!(customer_id, reference, credit = %credit, balance = %balance, "Wallet topped up");
        }

        Ok(ReconciliationOutcome::Applied {
            payment,
            invoice: None,
        })
    }
}

/// Order by number first, then by the bounded numeric id.
async fn resolve_order(conn: &mut Conn, reference: &str) -> DbResult<Option<Order>> {
    for candidate in OrderReference::candidates(reference) {
        let found = match candidate {
            OrderReference::Number(number) => OrderRepository::find_by_number(conn, &number).await?,
            OrderReference::NumericId(id) => OrderRepository::find_by_id(conn, id).await?,
        };
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

/// A completed or refunded payment is never rewritten. A row matched by
/// gateway id is settled once it leaves `pending`; the id-less fallback may
/// still move a failed attempt to a different outcome.
fn already_settled(stored: PaymentStatus, reported: PaymentStatus, matched_by_id: bool) -> bool {
    match stored {
        PaymentStatus::Pending => false,
        PaymentStatus::Completed | PaymentStatus::Refunded => true,
        _ if matched_by_id => true,
        other => other == reported,
    }
}

/// Copies gateway identifiers and the new status onto `payment`.
fn stamp(payment: &mut Payment, payload: &GatewayCallbackPayload, status: PaymentStatus, now: DateTime<Utc>) {
    payment.status = status;
    if payment.receipt_id.is_none() {
        payment.receipt_id = payload.receipt_key().map(str::to_string);
    }
    if payload.transaction_id.is_some() {
        payment.transaction_id = payload.transaction_id.clone();
    }
    if payload.payment_id.is_some() {
        payment.gateway_payment_id = payload.payment_id.clone();
    }
    if payload.track_id.is_some() {
        payment.track_id = payload.track_id.clone();
    }
    if status == PaymentStatus::Completed {
        payment.paid_at = Some(now);
    }
    payment.updated_at = now;
}

/// Marks the invoice paid once completed payments cover the amount due.
async fn promote_invoice(
    conn: &mut Conn,
    order: &Order,
    invoice: &mut Invoice,
    now: DateTime<Utc>,
) -> FulfillmentResult<()> {
    let paid = PaymentRepository::sum_completed(conn, invoice.id).await?;

    match invoice.status {
        InvoiceStatus::Pending if paid >= invoice.amount_due => {
            mark_paid(invoice, now)?;
            InvoiceService::save(conn, invoice).await?;
            info!(order_id = order.id, invoice_id = invoice.id, paid = %paid, "Invoice paid");
        }
        InvoiceStatus::Pending => {
            warn!(
                order_id = order.id,
                invoice_id = invoice.id,
                paid = %paid,
                amount_due = %invoice.amount_due,
                shortfall = %shortfall(invoice.amount_due, paid),
                "Payment does not cover invoice yet"
            );
        }
        InvoiceStatus::Paid => {}
        other => {
            warn!(order_id = order.id, invoice_id = invoice.id, status = %other, "Capture recorded against closed invoice");
        }
    }
    Ok(())
}
