//! # Invoice Repository
//!
//! One invoice per order (`UNIQUE(order_id)`), numbered `INV-{order_number}`.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::Conn;
use souq_core::invoice::InvoiceAmounts;
use souq_core::{Invoice, InvoiceStatus};

const INVOICE_COLUMNS: &str = "id, order_id, invoice_number, subtotal, offer_discount, \
                               points_discount, total_discount, tax_amount, amount_due, \
                               used_points, status, paid_at, created_at, updated_at";

/// Fields of a new invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub order_id: i64,
    pub invoice_number: String,
    pub amounts: InvoiceAmounts,
    pub used_points: i64,
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct InvoiceRepository;

impl InvoiceRepository {
    pub async fn insert(conn: &mut Conn, invoice: &NewInvoice) -> DbResult<Invoice> {
        debug!(invoice_number = %invoice.invoice_number, "Inserting invoice");

        let a = &invoice.amounts;
        let sql = format!(
            "INSERT INTO invoices (order_id, invoice_number, subtotal, offer_discount, \
                points_discount, total_discount, tax_amount, amount_due, used_points, status, \
                paid_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12) \
             RETURNING {INVOICE_COLUMNS}"
        );

        sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice.order_id)
            .bind(&invoice.invoice_number)
            .bind(a.subtotal)
            .bind(a.offer_discount)
            .bind(a.points_discount)
            .bind(a.total_discount)
            .bind(a.tax_amount)
            .bind(a.amount_due)
            .bind(invoice.used_points)
            .bind(invoice.status)
            .bind(invoice.paid_at)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => {
                    DbError::duplicate(field, invoice.invoice_number.clone())
                }
                other => other,
            })
    }

    pub async fn find_by_id(conn: &mut Conn, id: i64) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(invoice)
    }

    pub async fn find_by_order(conn: &mut Conn, order_id: i64) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE order_id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(invoice)
    }

    /// Writes amounts and status of `invoice`.
    pub async fn update(conn: &mut Conn, invoice: &Invoice) -> DbResult<()> {
        debug!(invoice_id = invoice.id, status = %invoice.status, "Updating invoice");

        let result = sqlx::query(
            "UPDATE invoices SET subtotal = ?2, offer_discount = ?3, points_discount = ?4, \
                total_discount = ?5, tax_amount = ?6, amount_due = ?7, used_points = ?8, \
                status = ?9, paid_at = ?10, updated_at = ?11 \
             WHERE id = ?1",
        )
        .bind(invoice.id)
        .bind(invoice.subtotal)
        .bind(invoice.offer_discount)
        .bind(invoice.points_discount)
        .bind(invoice.total_discount)
        .bind(invoice.tax_amount)
        .bind(invoice.amount_due)
        .bind(invoice.used_points)
        .bind(invoice.status)
        .bind(invoice.paid_at)
        .bind(invoice.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", invoice.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::order::{NewOrder, OrderRepository};
    use crate::{Database, DbConfig};
    use souq_core::invoice::calculate_amounts;
    use souq_core::{DeliveryType, Money, OrderSource, OrderStatus, PaymentMethod, Rate};

    #[tokio::test]
    async fn test_one_invoice_per_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let order = OrderRepository::insert(
            &mut conn,
            &NewOrder {
                order_number: "APPS-2026-000001".into(),
                source: OrderSource::App,
                customer_id: None,
                charity_id: None,
                delivery_type: DeliveryType::Pickup,
                payment_method: PaymentMethod::Cash,
                status: OrderStatus::Pending,
                total_amount: Money::from_minor(20_000),
                notes: None,
            },
        )
        .await
        .unwrap();

        let new_invoice = NewInvoice {
            order_id: order.id,
            invoice_number: "INV-APPS-2026-000001".into(),
            amounts: calculate_amounts(
                Money::from_minor(20_000),
                Money::from_minor(5_000),
                Money::zero(),
                Rate::from_bps(1500),
            ),
            used_points: 0,
            status: InvoiceStatus::Pending,
            paid_at: None,
        };

        let invoice = InvoiceRepository::insert(&mut conn, &new_invoice).await.unwrap();
        assert_eq!(invoice.amount_due, Money::from_minor(17_250));
        assert_eq!(invoice.tax_amount, Money::from_minor(2_250));

        let err = InvoiceRepository::insert(&mut conn, &new_invoice).await.unwrap_err();
        assert!(err.is_unique_violation());

        let found = InvoiceRepository::find_by_order(&mut conn, order.id).await.unwrap().unwrap();
        assert_eq!(found.id, invoice.id);
    }
}
