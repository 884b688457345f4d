//! Invoice persistence on top of the pure calculator in `souq_core::invoice`.

use chrono::{DateTime, Utc};
use tracing::debug;

use souq_core::invoice::{invoice_number, InvoiceAmounts};
use souq_core::{CoreError, Invoice, InvoiceStatus, Order};
use souq_db::{Conn, InvoiceRepository, NewInvoice};

use crate::error::FulfillmentResult;

#[derive(Debug, Clone, Copy)]
pub struct InvoiceService;

impl InvoiceService {
    /// Returns the order's invoice, creating it on first call.
    ///
    /// `is_paid` stamps `paid` and `paid_at` directly (wallet orders).
    pub async fn create_or_get(
        conn: &mut Conn,
        order: &Order,
        amounts: &InvoiceAmounts,
        used_points: i64,
        is_paid: bool,
        now: DateTime<Utc>,
    ) -> FulfillmentResult<Invoice> {
        if let Some(existing) = InvoiceRepository::find_by_order(conn, order.id).await? {
            debug!(order_id = order.id, invoice_id = existing.id, "Invoice already exists");
            return Ok(existing);
        }

        let invoice = InvoiceRepository::insert(
            conn,
            &NewInvoice {
                order_id: order.id,
                invoice_number: invoice_number(&order.order_number),
                amounts: *amounts,
                used_points,
                status: if is_paid {
                    InvoiceStatus::Paid
                } else {
                    InvoiceStatus::Pending
                },
                paid_at: is_paid.then_some(now),
            },
        )
        .await?;
        Ok(invoice)
    }

    pub async fn for_order(conn: &mut Conn, order_id: i64) -> FulfillmentResult<Invoice> {
        let invoice = InvoiceRepository::find_by_order(conn, order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", format!("order {order_id}")))?;
        Ok(invoice)
    }

    pub async fn save(conn: &mut Conn, invoice: &Invoice) -> FulfillmentResult<()> {
        InvoiceRepository::update(conn, invoice).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use souq_core::invoice::calculate_amounts;
    use souq_core::{Money, Rate};

    #[tokio::test]
    async fn test_create_or_get_is_idempotent() {
        let fx = testing::fixture().await;
        let order = testing::seed_bare_order(&fx.db, None).await;
        let amounts = calculate_amounts(
            Money::from_minor(20_000),
            Money::from_minor(5_000),
            Money::zero(),
            Rate::from_bps(1500),
        );
        let now = Utc::now();

        let mut tx = fx.db.begin().await.unwrap();
        let first = InvoiceService::create_or_get(&mut tx, &order, &amounts, 0, true, now)
            .await
            .unwrap();
        let second = InvoiceService::create_or_get(&mut tx, &order, &amounts, 0, false, now)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.invoice_number, format!("INV-{}", order.order_number));
        assert_eq!(first.amount_due, Money::from_minor(17_250));
        assert!(second.is_paid());
        assert!(second.paid_at.is_some());
    }
}
