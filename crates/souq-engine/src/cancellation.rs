//! # Cancellation and Refunds
//!
//! Cancelling an order gives back everything the order took: stock, redeemed
//! points and money. How money comes back depends on how it was paid.
//!
//! ```text
//! paid by wallet   ──▶ credit amount due now, invoice refunded
//! captured online  ──▶ refund request (pending) ──approve──▶ wallet credit
//!                                               └─reject───▶ decision only
//! cash / unpaid    ──▶ invoice cancelled
//! ```

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use souq_core::invoice::{mark_cancelled, mark_refunded};
use souq_core::validation::validate_note;
use souq_core::{
    CoreError, Delivery, Invoice, InvoiceStatus, Money, Order, OrderStatus, PaymentMethod,
    PaymentStatus, RefundRequest, RefundStatus,
};
use souq_db::{Conn, InvoiceRepository, OrderRepository, PaymentRepository, RefundRepository};

use crate::activity::Activity;
use crate::context::EngineContext;
use crate::delivery::DeliverySnapshotter;
use crate::error::FulfillmentResult;
use crate::inventory::InventoryLedger;
use crate::invoice::InvoiceService;
use crate::points::PointsLedger;
use crate::wallet::{customer_required, refund_payments, WalletLedger};

#[derive(Debug, Clone, Serialize)]
pub struct CancellationOutcome {
    pub order: Order,
    pub invoice: Invoice,
    pub delivery: Option<Delivery>,
    /// Opened when online captures must be returned.
    pub refund_request: Option<RefundRequest>,
    /// Amount credited to the wallet right away.
    pub wallet_refund: Money,
    pub points_refunded: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundDecision {
    pub request: RefundRequest,
    pub invoice: Invoice,
    /// New wallet balance after an approval.
    pub wallet_balance: Option<Money>,
}

#[derive(Debug, Clone)]
pub struct CancellationService {
    ctx: EngineContext,
}

impl CancellationService {
    pub fn new(ctx: EngineContext) -> Self {
        CancellationService { ctx }
    }

    pub async fn cancel_order(
        &self,
        order_id: i64,
        reason: Option<String>,
    ) -> FulfillmentResult<CancellationOutcome> {
        let reason = validate_note("reason", reason.as_deref())?;
        let now = Utc::now();
        let mut tx = self.ctx.db.begin().await?;

        let mut order = OrderRepository::find_by_id(&mut tx, order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;
        match order.status {
            OrderStatus::Cancelled => {
                return Err(CoreError::already_processed("Order", order_id, order.status).into());
            }
            status if !status.can_transition_to(OrderStatus::Cancelled) => {
                return Err(CoreError::invalid_transition("Order", status, OrderStatus::Cancelled).into());
            }
            _ => {}
        }

        let mut invoice = InvoiceService::for_order(&mut tx, order_id).await?;

        let points_refunded = match order.customer_id {
            Some(customer_id) if invoice.used_points > 0 => {
                PointsLedger::refund(&mut tx, customer_id, invoice.used_points).await?;
                invoice.used_points
            }
            _ => 0,
        };

        let online_captured = captured_online(&mut tx, invoice.id).await?;
        let mut wallet_refund = Money::zero();
        let mut refund_request = None;

        if invoice.status == InvoiceStatus::Paid && order.payment_method == PaymentMethod::Wallet {
            let customer_id = order.customer_id.ok_or_else(|| customer_required(order_id))?;
            WalletLedger::credit(&mut tx, customer_id, invoice.amount_due).await?;
            wallet_refund = invoice.amount_due;
            mark_refunded(&mut invoice, now)?;
            refund_payments(&mut tx, invoice.id, PaymentMethod::Wallet).await?;
        } else if online_captured.is_positive() {
            // a settled invoice refunds what it was worth; a partial capture
            // refunds what was actually taken
            let amount = if invoice.is_paid() {
                invoice.amount_due
            } else {
                online_captured
            };
            let request = RefundRepository::insert(
                &mut tx,
                order_id,
                invoice.id,
                order.customer_id,
                amount,
                reason.as_deref(),
            )
            .await?;
            refund_request = Some(request);
            close_invoice(&mut invoice, now)?;
        } else {
            close_invoice(&mut invoice, now)?;
        }

        let items = OrderRepository::items(&mut tx, order_id).await?;
        InventoryLedger::release_items(&mut tx, &items).await?;
        let delivery = DeliverySnapshotter::cancel(&mut tx, order_id).await?;

        order.status = OrderStatus::Cancelled;
        order.cancel_reason = reason;
        order.cancelled_at = Some(now);
        order.updated_at = now;

        InvoiceService::save(&mut tx, &invoice).await?;
        OrderRepository::update(&mut tx, &order).await?;

        tx.commit().await?;

        info!(
            order_id,
            order_number = %order.order_number,
            wallet_refund = %wallet_refund,
            points_refunded,
            refund_requested = refund_request.is_some(),
            "Order cancelled"
        );
        self.ctx.record(Activity::new(
            "order_cancelled",
            "order",
            order_id,
            order
                .cancel_reason
                .clone()
                .unwrap_or_else(|| order.order_number.clone()),
        ));
        if let Some(request) = &refund_request {
            self.ctx.record(Activity::new(
                "refund_requested",
                "refund_request",
                request.id,
                format!("{} for {}", request.amount, order.order_number),
            ));
        }

        Ok(CancellationOutcome {
            order,
            invoice,
            delivery,
            refund_request,
            wallet_refund,
            points_refunded,
        })
    }

    /// Approves a pending refund: the captured amount goes to the
    /// customer's wallet and the invoice becomes refunded.
    pub async fn approve_refund(
        &self,
        refund_id: i64,
        approved_by: &str,
        admin_notes: Option<String>,
    ) -> FulfillmentResult<RefundDecision> {
        let admin_notes = validate_note("admin_notes", admin_notes.as_deref())?;
        let now = Utc::now();
        let mut tx = self.ctx.db.begin().await?;

        let mut request = pending_request(&mut tx, refund_id).await?;
        let customer_id = request
            .customer_id
            .ok_or_else(|| customer_required(request.order_id))?;

        let balance = WalletLedger::credit(&mut tx, customer_id, request.amount).await?;

        let mut invoice = InvoiceRepository::find_by_id(&mut tx, request.invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", request.invoice_id))?;
        if invoice.status != InvoiceStatus::Refunded {
            mark_refunded(&mut invoice, now)?;
            InvoiceService::save(&mut tx, &invoice).await?;
        }
        refund_payments(&mut tx, invoice.id, PaymentMethod::Online).await?;

        request.status = RefundStatus::Approved;
        request.approved_by = Some(approved_by.to_string());
        request.admin_notes = admin_notes;
        request.processed_at = Some(now);
        RefundRepository::update(&mut tx, &request).await?;

        tx.commit().await?;

        info!(refund_id, customer_id, amount = %request.amount, balance = %balance, "Refund approved");
        self.ctx.record(Activity::new(
            "refund_approved",
            "refund_request",
            refund_id,
            format!("{} credited by {approved_by}", request.amount),
        ));

        Ok(RefundDecision {
            request,
            invoice,
            wallet_balance: Some(balance),
        })
    }

    /// Records a rejection. No money moves.
    pub async fn reject_refund(
        &self,
        refund_id: i64,
        rejected_by: &str,
        admin_notes: Option<String>,
    ) -> FulfillmentResult<RefundDecision> {
        let admin_notes = validate_note("admin_notes", admin_notes.as_deref())?;
        let mut tx = self.ctx.db.begin().await?;

        let mut request = pending_request(&mut tx, refund_id).await?;
        request.status = RefundStatus::Rejected;
        request.approved_by = Some(rejected_by.to_string());
        request.admin_notes = admin_notes;
        request.processed_at = Some(Utc::now());
        RefundRepository::update(&mut tx, &request).await?;

        let invoice = InvoiceRepository::find_by_id(&mut tx, request.invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", request.invoice_id))?;

        tx.commit().await?;

        warn!(refund_id, amount = %request.amount, "Refund rejected");
        self.ctx.record(Activity::new(
            "refund_rejected",
            "refund_request",
            refund_id,
            format!("rejected by {rejected_by}"),
        ));

        Ok(RefundDecision {
            request,
            invoice,
            wallet_balance: None,
        })
    }

    pub async fn refunds_for_order(&self, order_id: i64) -> FulfillmentResult<Vec<RefundRequest>> {
        let mut conn = self.ctx.db.pool().acquire().await?;
        Ok(RefundRepository::list_for_order(&mut conn, order_id).await?)
    }
}

async fn pending_request(conn: &mut Conn, refund_id: i64) -> FulfillmentResult<RefundRequest> {
    let request = RefundRepository::find_by_id(conn, refund_id)
        .await?
        .ok_or_else(|| CoreError::not_found("RefundRequest", refund_id))?;
    if request.status != RefundStatus::Pending {
        return Err(CoreError::already_processed("RefundRequest", refund_id, request.status).into());
    }
    Ok(request)
}

/// Total of completed online payments on the invoice.
async fn captured_online(conn: &mut Conn, invoice_id: i64) -> FulfillmentResult<Money> {
    let total = PaymentRepository::for_invoice(conn, invoice_id)
        .await?
        .iter()
        .filter(|p| p.method == PaymentMethod::Online && p.status == PaymentStatus::Completed)
        .map(|p| p.amount)
        .sum();
    Ok(total)
}

fn close_invoice(invoice: &mut Invoice, now: chrono::DateTime<Utc>) -> FulfillmentResult<()> {
    if matches!(invoice.status, InvoiceStatus::Pending | InvoiceStatus::Paid) {
        mark_cancelled(invoice, now)?;
    }
    Ok(())
}
