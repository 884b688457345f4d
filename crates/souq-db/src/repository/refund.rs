//! # Refund Repository
//!
//! Refund requests opened when a paid online order is cancelled. They wait
//! for an operator to approve or reject them.

use chrono::Utc;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::Conn;
use souq_core::{Money, RefundRequest, RefundStatus};

const REFUND_COLUMNS: &str = "id, order_id, invoice_id, customer_id, amount, status, reason, \
                              admin_notes, approved_by, processed_at, created_at";

#[derive(Debug, Clone, Copy)]
pub struct RefundRepository;

impl RefundRepository {
    pub async fn insert(
        conn: &mut Conn,
        order_id: i64,
        invoice_id: i64,
        customer_id: Option<i64>,
        amount: Money,
        reason: Option<&str>,
    ) -> DbResult<RefundRequest> {
        debug!(order_id, amount = %amount, "Opening refund request");

        let sql = format!(
            "INSERT INTO refund_requests (order_id, invoice_id, customer_id, amount, status, reason, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             RETURNING {REFUND_COLUMNS}"
        );
        let request = sqlx::query_as::<_, RefundRequest>(&sql)
            .bind(order_id)
            .bind(invoice_id)
            .bind(customer_id)
            .bind(amount)
            .bind(RefundStatus::Pending)
            .bind(reason)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await?;
        Ok(request)
    }

    pub async fn find_by_id(conn: &mut Conn, id: i64) -> DbResult<Option<RefundRequest>> {
        let sql = format!("SELECT {REFUND_COLUMNS} FROM refund_requests WHERE id = ?1");
        let request = sqlx::query_as::<_, RefundRequest>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(request)
    }

    pub async fn list_for_order(conn: &mut Conn, order_id: i64) -> DbResult<Vec<RefundRequest>> {
        let sql = format!("SELECT {REFUND_COLUMNS} FROM refund_requests WHERE order_id = ?1 ORDER BY id");
        let requests = sqlx::query_as::<_, RefundRequest>(&sql)
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(requests)
    }

    /// Writes the decision fields of `request`.
    pub async fn update(conn: &mut Conn, request: &RefundRequest) -> DbResult<()> {
        debug!(refund_id = request.id, status = %request.status, "Updating refund request");

        let result = sqlx::query(
            "UPDATE refund_requests SET status = ?2, admin_notes = ?3, approved_by = ?4, \
                processed_at = ?5 \
             WHERE id = ?1",
        )
        .bind(request.id)
        .bind(request.status)
        .bind(&request.admin_notes)
        .bind(&request.approved_by)
        .bind(request.processed_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("RefundRequest", request.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::invoice::{InvoiceRepository, NewInvoice};
    use crate::repository::order::{NewOrder, OrderRepository};
    use crate::{Database, DbConfig};
    use souq_core::invoice::calculate_amounts;
    use souq_core::{DeliveryType, InvoiceStatus, OrderSource, OrderStatus, PaymentMethod, Rate};

    #[tokio::test]
    async fn test_open_and_decide() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let order = OrderRepository::insert(
            &mut conn,
            &NewOrder {
                order_number: "WEBS-2026-000001".into(),
                source: OrderSource::Web,
                customer_id: None,
                charity_id: None,
                delivery_type: DeliveryType::Pickup,
                payment_method: PaymentMethod::Online,
                status: OrderStatus::Cancelled,
                total_amount: Money::from_minor(8_000),
                notes: None,
            },
        )
        .await
        .unwrap();
        let invoice = InvoiceRepository::insert(
            &mut conn,
            &NewInvoice {
                order_id: order.id,
                invoice_number: "INV-WEBS-2026-000001".into(),
                amounts: calculate_amounts(Money::from_minor(8_000), Money::zero(), Money::zero(), Rate::zero()),
                used_points: 0,
                status: InvoiceStatus::Cancelled,
                paid_at: None,
            },
        )
        .await
        .unwrap();

        let mut request = RefundRepository::insert(
            &mut conn,
            order.id,
            invoice.id,
            None,
            Money::from_minor(8_000),
            Some("customer request"),
        )
        .await
        .unwrap();
        assert_eq!(request.status, RefundStatus::Pending);

        request.status = RefundStatus::Approved;
        request.approved_by = Some("admin".into());
        request.processed_at = Some(Utc::now());
        RefundRepository::update(&mut conn, &request).await.unwrap();

        let stored = RefundRepository::find_by_id(&mut conn, request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RefundStatus::Approved);
        assert_eq!(RefundRepository::list_for_order(&mut conn, order.id).await.unwrap().len(), 1);
    }
}
