//! # Points Repository
//!
//! Append-only history of earned and converted loyalty points. Balances
//! live on `customers.points`; this table only records movements.

use chrono::Utc;

use crate::error::DbResult;
use crate::Conn;
use souq_core::{Money, PointsTransaction, PointsTransactionType};

#[derive(Debug, Clone, Copy)]
pub struct PointsRepository;

impl PointsRepository {
    pub async fn insert(
        conn: &mut Conn,
        customer_id: i64,
        order_id: Option<i64>,
        transaction_type: PointsTransactionType,
        points: i64,
        amount: Money,
    ) -> DbResult<PointsTransaction> {
        let transaction = sqlx::query_as::<_, PointsTransaction>(
            "INSERT INTO points_transactions \
                (customer_id, order_id, transaction_type, points, amount, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             RETURNING id, customer_id, order_id, transaction_type, points, amount, created_at",
        )
        .bind(customer_id)
        .bind(order_id)
        .bind(transaction_type)
        .bind(points)
        .bind(amount)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;
        Ok(transaction)
    }

    /// Newest first.
    pub async fn list_for_customer(conn: &mut Conn, customer_id: i64) -> DbResult<Vec<PointsTransaction>> {
        let history = sqlx::query_as::<_, PointsTransaction>(
            "SELECT id, customer_id, order_id, transaction_type, points, amount, created_at \
             FROM points_transactions WHERE customer_id = ?1 ORDER BY id DESC",
        )
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(history)
    }
}
