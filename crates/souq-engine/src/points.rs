//! # Loyalty Points Ledger
//!
//! Balance lives on `customers.points`; earned points and conversions are
//! also appended to `points_transactions`.

use tracing::{debug, info};

use souq_core::points::deduct_clamped;
use souq_core::{CoreError, Customer, Money, PointsTransaction, PointsTransactionType};
use souq_db::{Conn, CustomerRepository, PointsRepository};

use crate::error::FulfillmentResult;

#[derive(Debug, Clone, Copy)]
pub struct PointsLedger;

impl PointsLedger {
    pub async fn customer(conn: &mut Conn, customer_id: i64) -> FulfillmentResult<Customer> {
        let customer = CustomerRepository::find_by_id(conn, customer_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Customer", customer_id))?;
        Ok(customer)
    }

    /// Fails with `InsufficientPoints` when the customer holds fewer than
    /// `requested` points.
    pub async fn ensure_available(
        conn: &mut Conn,
        customer_id: i64,
        requested: i64,
    ) -> FulfillmentResult<Customer> {
        let customer = Self::customer(conn, customer_id).await?;
        if customer.points < requested {
            return Err(CoreError::InsufficientPoints {
                available: customer.points,
                requested,
            }
            .into());
        }
        Ok(customer)
    }

    /// Removes points, clamping the balance at zero. Returns the new balance.
    pub async fn deduct(conn: &mut Conn, customer_id: i64, points: i64) -> FulfillmentResult<i64> {
        if points <= 0 {
            return Ok(Self::customer(conn, customer_id).await?.points);
        }
        let customer = Self::customer(conn, customer_id).await?;
        let target = deduct_clamped(customer.points, points);
        debug!(customer_id, points, balance = target, "Deducting points");
        Ok(CustomerRepository::adjust_points(conn, customer_id, target - customer.points).await?)
    }

    /// Gives points back. Returns the new balance.
    pub async fn refund(conn: &mut Conn, customer_id: i64, points: i64) -> FulfillmentResult<i64> {
        if points <= 0 {
            return Ok(Self::customer(conn, customer_id).await?.points);
        }
        debug!(customer_id, points, "Refunding points");
        Ok(CustomerRepository::adjust_points(conn, customer_id, points).await?)
    }

    /// Credits points earned by a completed order and appends the history row.
    pub async fn record_earned(
        conn: &mut Conn,
        customer_id: i64,
        order_id: i64,
        points: i64,
    ) -> FulfillmentResult<Option<PointsTransaction>> {
        if points <= 0 {
            return Ok(None);
        }
        CustomerRepository::adjust_points(conn, customer_id, points).await?;
        let entry = PointsRepository::insert(
            conn,
            customer_id,
            Some(order_id),
            PointsTransactionType::PointsEarned,
            points,
            Money::zero(),
        )
        .await?;
        info!(customer_id, order_id, points, "Points earned");
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn test_deduct_clamps_and_refund_restores() {
        let fx = testing::fixture().await;
        let customer = testing::seed_customer(&fx.db, "Huda", 40, 0).await;

        let mut tx = fx.db.begin().await.unwrap();
        assert_eq!(PointsLedger::deduct(&mut tx, customer, 100).await.unwrap(), 0);
        assert_eq!(PointsLedger::refund(&mut tx, customer, 25).await.unwrap(), 25);
        assert!(matches!(
            PointsLedger::ensure_available(&mut tx, customer, 30).await,
            Err(crate::FulfillmentError::Domain(CoreError::InsufficientPoints { available: 25, .. }))
        ));

        let entry = PointsLedger::record_earned(&mut tx, customer, 1, 0).await.unwrap();
        assert!(entry.is_none());
        tx.commit().await.unwrap();
    }
}
