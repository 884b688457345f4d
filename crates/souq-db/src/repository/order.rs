//! # Order Repository
//!
//! Orders, their line items, and the offers attached to them.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert()            → Order { status: Pending, order_number }          │
//! │  insert_item() × n   → OrderItem (paid and reward lines)                │
//! │  replace_offers()    → order_offers rows                                │
//! │  update()            → status / totals / cancellation fields            │
//! │                                                                         │
//! │  Orders are never hard-deleted here.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::Conn;
use souq_core::{
    DeliveryType, LineItem, Money, Order, OrderItem, OrderOffer, OrderSource, OrderStatus,
    PaymentMethod,
};

const ORDER_COLUMNS: &str = "id, order_number, source, customer_id, charity_id, delivery_type, \
                             payment_method, status, total_amount, points_awarded, notes, \
                             cancel_reason, cancelled_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, variant_id, name, sku, unit_price, \
                            quantity, total_price, is_offer, created_at";

/// Fields of a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub source: OrderSource,
    pub customer_id: Option<i64>,
    pub charity_id: Option<i64>,
    pub delivery_type: DeliveryType,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct OrderRepository;

impl OrderRepository {
    pub async fn insert(conn: &mut Conn, order: &NewOrder) -> DbResult<Order> {
        debug!(order_number = %order.order_number, "Inserting order");

        let now = Utc::now();
        let sql = format!(
            "INSERT INTO orders (order_number, source, customer_id, charity_id, delivery_type, \
                payment_method, status, total_amount, notes, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10) \
             RETURNING {ORDER_COLUMNS}"
        );

        sqlx::query_as::<_, Order>(&sql)
            .bind(&order.order_number)
            .bind(order.source)
            .bind(order.customer_id)
            .bind(order.charity_id)
            .bind(order.delivery_type)
            .bind(order.payment_method)
            .bind(order.status)
            .bind(order.total_amount)
            .bind(&order.notes)
            .bind(now)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => {
                    DbError::duplicate(field, order.order_number.clone())
                }
                other => other,
            })
    }

    pub async fn find_by_id(conn: &mut Conn, id: i64) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(order)
    }

    pub async fn get(conn: &mut Conn, id: i64) -> DbResult<Order> {
        Self::find_by_id(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    pub async fn find_by_number(conn: &mut Conn, order_number: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_number)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(order)
    }

    /// Writes every mutable column of `order` and bumps `updated_at`.
    pub async fn update(conn: &mut Conn, order: &Order) -> DbResult<()> {
        debug!(order_id = order.id, status = %order.status, "Updating order");

        let result = sqlx::query(
            "UPDATE orders SET customer_id = ?2, charity_id = ?3, delivery_type = ?4, \
                payment_method = ?5, status = ?6, total_amount = ?7, points_awarded = ?8, \
                notes = ?9, cancel_reason = ?10, cancelled_at = ?11, updated_at = ?12 \
             WHERE id = ?1",
        )
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.charity_id)
        .bind(order.delivery_type)
        .bind(order.payment_method)
        .bind(order.status)
        .bind(order.total_amount)
        .bind(order.points_awarded)
        .bind(&order.notes)
        .bind(&order.cancel_reason)
        .bind(order.cancelled_at)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order.id));
        }
        Ok(())
    }

    /// Highest order number issued for `{prefix}-{year}-`.
    pub async fn last_number(conn: &mut Conn, number_prefix: &str) -> DbResult<Option<String>> {
        super::last_with_prefix(conn, "orders", "order_number", number_prefix).await
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    pub async fn insert_item(conn: &mut Conn, order_id: i64, line: &LineItem) -> DbResult<OrderItem> {
        let sql = format!(
            "INSERT INTO order_items (order_id, product_id, variant_id, name, sku, unit_price, \
                quantity, total_price, is_offer, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             RETURNING {ITEM_COLUMNS}"
        );

        let item = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.variant_id)
            .bind(&line.name)
            .bind(&line.sku)
            .bind(line.unit_price)
            .bind(line.quantity)
            .bind(line.total_price)
            .bind(line.is_offer)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await?;
        Ok(item)
    }

    pub async fn items(conn: &mut Conn, order_id: i64) -> DbResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY id");
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(items)
    }

    pub async fn delete_items(conn: &mut Conn, order_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
            .bind(order_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Attached offers
    // -------------------------------------------------------------------------

    pub async fn offers(conn: &mut Conn, order_id: i64) -> DbResult<Vec<OrderOffer>> {
        let offers = sqlx::query_as::<_, OrderOffer>(
            "SELECT order_id, offer_id, quantity FROM order_offers WHERE order_id = ?1 ORDER BY offer_id",
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(offers)
    }

    /// Replaces the attached offers with `(offer_id, quantity)` pairs.
    pub async fn replace_offers(conn: &mut Conn, order_id: i64, offers: &[(i64, i64)]) -> DbResult<()> {
        sqlx::query("DELETE FROM order_offers WHERE order_id = ?1")
            .bind(order_id)
            .execute(&mut *conn)
            .await?;

        for (offer_id, quantity) in offers {
            sqlx::query("INSERT INTO order_offers (order_id, offer_id, quantity) VALUES (?1, ?2, ?3)")
                .bind(order_id)
                .bind(*offer_id)
                .bind(*quantity)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }
}
