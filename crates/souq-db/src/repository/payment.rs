//! # Payment Repository
//!
//! Payments against invoices and stand-alone wallet top-ups.
//!
//! ## Idempotent Lookup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. find_by_gateway_ids(invoice, online, ids)  any receipt, transaction │
//! │                                                or gateway payment id    │
//! │  2. find_latest_pending / find_most_recent     row created at checkout  │
//! │  3. insert(...)                                UNIQUE(invoice, receipt) │
//! │                                                stops a racing duplicate │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::Conn;
use souq_core::{Money, Payment, PaymentMethod, PaymentStatus};

const PAYMENT_COLUMNS: &str = "id, payment_number, invoice_id, customer_id, reference, amount, \
                               method, status, receipt_id, transaction_id, gateway_payment_id, \
                               track_id, payment_url, paid_at, created_at, updated_at";

/// Fields of a new payment.
#[derive(Debug, Clone, Default)]
pub struct NewPayment {
    pub payment_number: String,
    pub invoice_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub reference: Option<String>,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub receipt_id: Option<String>,
    pub transaction_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub track_id: Option<String>,
    pub payment_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct PaymentRepository;

impl PaymentRepository {
    /// Inserts a payment. A collision on `(invoice_id, receipt_id)` surfaces
    /// as [`DbError::UniqueViolation`].
    pub async fn insert(conn: &mut Conn, payment: &NewPayment) -> DbResult<Payment> {
        debug!(payment_number = %payment.payment_number, method = %payment.method, "Inserting payment");

        let sql = format!(
            "INSERT INTO payments (payment_number, invoice_id, customer_id, reference, amount, \
                method, status, receipt_id, transaction_id, gateway_payment_id, track_id, \
                payment_url, paid_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14) \
             RETURNING {PAYMENT_COLUMNS}"
        );

        let inserted = sqlx::query_as::<_, Payment>(&sql)
            .bind(&payment.payment_number)
            .bind(payment.invoice_id)
            .bind(payment.customer_id)
            .bind(&payment.reference)
            .bind(payment.amount)
            .bind(payment.method)
            .bind(payment.status)
            .bind(&payment.receipt_id)
            .bind(&payment.transaction_id)
            .bind(&payment.gateway_payment_id)
            .bind(&payment.track_id)
            .bind(&payment.payment_url)
            .bind(payment.paid_at)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await?;
        Ok(inserted)
    }

    pub async fn find_by_id(conn: &mut Conn, id: i64) -> DbResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(payment)
    }

    /// First payment of the invoice whose receipt, transaction or gateway
    /// payment id equals one of `ids`, tried in order.
    pub async fn find_by_gateway_ids(
        conn: &mut Conn,
        invoice_id: i64,
        method: PaymentMethod,
        ids: &[&str],
    ) -> DbResult<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE invoice_id = ?1 AND method = ?2 \
               AND (receipt_id = ?3 OR transaction_id = ?3 OR gateway_payment_id = ?3) \
             ORDER BY id LIMIT 1"
        );
        for id in ids {
            let payment = sqlx::query_as::<_, Payment>(&sql)
                .bind(invoice_id)
                .bind(method)
                .bind(*id)
                .fetch_optional(&mut *conn)
                .await?;
            if payment.is_some() {
                return Ok(payment);
            }
        }
        Ok(None)
    }

    /// Most recent pending payment of `method` for the invoice.
    pub async fn find_latest_pending(
        conn: &mut Conn,
        invoice_id: i64,
        method: PaymentMethod,
    ) -> DbResult<Option<Payment>> {
        Self::find_latest(conn, invoice_id, method, PaymentStatus::Pending).await
    }

    /// Most recent payment of `method` for the invoice, whatever its status.
    pub async fn find_most_recent(
        conn: &mut Conn,
        invoice_id: i64,
        method: PaymentMethod,
    ) -> DbResult<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE invoice_id = ?1 AND method = ?2 \
             ORDER BY id DESC LIMIT 1"
        );
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(invoice_id)
            .bind(method)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(payment)
    }

    pub async fn find_latest(
        conn: &mut Conn,
        invoice_id: i64,
        method: PaymentMethod,
        status: PaymentStatus,
    ) -> DbResult<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE invoice_id = ?1 AND method = ?2 AND status = ?3 \
             ORDER BY id DESC LIMIT 1"
        );
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(invoice_id)
            .bind(method)
            .bind(status)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(payment)
    }

    /// Stand-alone payment by reference (`WCH-…`).
    pub async fn find_by_reference(conn: &mut Conn, reference: &str) -> DbResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = ?1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(reference)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(payment)
    }

    pub async fn for_invoice(conn: &mut Conn, invoice_id: i64) -> DbResult<Vec<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = ?1 ORDER BY id");
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(invoice_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(payments)
    }

    /// Sum of `completed` payments for the invoice.
    pub async fn sum_completed(conn: &mut Conn, invoice_id: i64) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = ?1 AND status = ?2",
        )
        .bind(invoice_id)
        .bind(PaymentStatus::Completed)
        .fetch_one(&mut *conn)
        .await?;
        Ok(Money::from_minor(total))
    }

    /// Writes status, amount and gateway identifiers of `payment`.
    pub async fn update(conn: &mut Conn, payment: &Payment) -> DbResult<()> {
        debug!(payment_id = payment.id, status = %payment.status, "Updating payment");

        let result = sqlx::query(
            "UPDATE payments SET amount = ?2, status = ?3, receipt_id = ?4, transaction_id = ?5, \
                gateway_payment_id = ?6, track_id = ?7, payment_url = ?8, paid_at = ?9, \
                updated_at = ?10 \
             WHERE id = ?1",
        )
        .bind(payment.id)
        .bind(payment.amount)
        .bind(payment.status)
        .bind(&payment.receipt_id)
        .bind(&payment.transaction_id)
        .bind(&payment.gateway_payment_id)
        .bind(&payment.track_id)
        .bind(&payment.payment_url)
        .bind(payment.paid_at)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", payment.id));
        }
        Ok(())
    }

    /// Highest payment number issued for `PAY-{year}-`.
    pub async fn last_number(conn: &mut Conn, number_prefix: &str) -> DbResult<Option<String>> {
        super::last_with_prefix(conn, "payments", "payment_number", number_prefix).await
    }

    /// Highest reference issued for `WCH-{year}-`.
    pub async fn last_reference(conn: &mut Conn, reference_prefix: &str) -> DbResult<Option<String>> {
        super::last_with_prefix(conn, "payments", "reference", reference_prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::invoice::{InvoiceRepository, NewInvoice};
    use crate::repository::order::{NewOrder, OrderRepository};
    use crate::{Database, DbConfig};
    use souq_core::invoice::calculate_amounts;
    use souq_core::{DeliveryType, InvoiceStatus, OrderSource, OrderStatus, Rate};

    async fn invoice_id(conn: &mut Conn) -> i64 {
        let order = OrderRepository::insert(
            conn,
            &NewOrder {
                order_number: "WEBS-2026-000001".into(),
                source: OrderSource::Web,
                customer_id: None,
                charity_id: None,
                delivery_type: DeliveryType::Pickup,
                payment_method: PaymentMethod::Online,
                status: OrderStatus::Pending,
                total_amount: Money::from_minor(10_000),
                notes: None,
            },
        )
        .await
        .unwrap();

        InvoiceRepository::insert(
            conn,
            &NewInvoice {
                order_id: order.id,
                invoice_number: "INV-WEBS-2026-000001".into(),
                amounts: calculate_amounts(Money::from_minor(10_000), Money::zero(), Money::zero(), Rate::zero()),
                used_points: 0,
                status: InvoiceStatus::Pending,
                paid_at: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn online(invoice_id: i64, number: &str, receipt: Option<&str>, status: PaymentStatus) -> NewPayment {
        NewPayment {
            payment_number: number.into(),
            invoice_id: Some(invoice_id),
            amount: Money::from_minor(4_000),
            method: PaymentMethod::Online,
            status,
            receipt_id: receipt.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_receipt_uniqueness_per_invoice() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let invoice = invoice_id(&mut conn).await;

        PaymentRepository::insert(&mut conn, &online(invoice, "PAY-2026-000001", Some("R1"), PaymentStatus::Completed))
            .await
            .unwrap();
        let err = PaymentRepository::insert(&mut conn, &online(invoice, "PAY-2026-000002", Some("R1"), PaymentStatus::Completed))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        // rows without a receipt never collide
        PaymentRepository::insert(&mut conn, &online(invoice, "PAY-2026-000003", None, PaymentStatus::Pending))
            .await
            .unwrap();
        PaymentRepository::insert(&mut conn, &online(invoice, "PAY-2026-000004", None, PaymentStatus::Pending))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lookups_and_sum() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let invoice = invoice_id(&mut conn).await;

        PaymentRepository::insert(&mut conn, &online(invoice, "PAY-2026-000001", Some("R1"), PaymentStatus::Completed))
            .await
            .unwrap();
        let pending = PaymentRepository::insert(&mut conn, &online(invoice, "PAY-2026-000002", None, PaymentStatus::Pending))
            .await
            .unwrap();
        PaymentRepository::insert(&mut conn, &online(invoice, "PAY-2026-000003", Some("R3"), PaymentStatus::Failed))
            .await
            .unwrap();

        let mut tagged = online(invoice, "PAY-2026-000004", Some("R4"), PaymentStatus::Completed);
        tagged.transaction_id = Some("T4".into());
        tagged.gateway_payment_id = Some("GW4".into());
        let tagged = PaymentRepository::insert(&mut conn, &tagged).await.unwrap();

        let by_receipt = PaymentRepository::find_by_gateway_ids(&mut conn, invoice, PaymentMethod::Online, &["R1"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_receipt.status, PaymentStatus::Completed);

        for ids in [&["T4"][..], &["GW4"], &["unknown", "T4"]] {
            let found = PaymentRepository::find_by_gateway_ids(&mut conn, invoice, PaymentMethod::Online, ids)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(found.id, tagged.id);
        }
        assert!(PaymentRepository::find_by_gateway_ids(&mut conn, invoice, PaymentMethod::Online, &["T9"])
            .await
            .unwrap()
            .is_none());

        let most_recent = PaymentRepository::find_most_recent(&mut conn, invoice, PaymentMethod::Online)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(most_recent.id, tagged.id);

        let latest = PaymentRepository::find_latest_pending(&mut conn, invoice, PaymentMethod::Online)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, pending.id);

        assert_eq!(
            PaymentRepository::sum_completed(&mut conn, invoice).await.unwrap(),
            Money::from_minor(8_000)
        );
        assert_eq!(
            PaymentRepository::last_number(&mut conn, "PAY-2026-").await.unwrap().as_deref(),
            Some("PAY-2026-000004")
        );
    }
}
