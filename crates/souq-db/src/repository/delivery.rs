//! # Delivery Repository
//!
//! At most one delivery row per order. Address fields are a snapshot of
//! display names taken when the order was placed, so later edits to the
//! customer's address book do not rewrite history.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::Conn;
use souq_core::{AddressSnapshot, Delivery, DeliveryStatus, PaymentMethod};

const DELIVERY_COLUMNS: &str = "id, order_id, country_name, governorate_name, area_name, block, \
                                street, house, avenue, directions, delivery_status, \
                                payment_method, delivery_datetime, received_datetime, notes, \
                                created_at, updated_at";

/// Fields of a new delivery.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub order_id: i64,
    pub snapshot: AddressSnapshot,
    pub payment_method: PaymentMethod,
    pub delivery_datetime: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct DeliveryRepository;

impl DeliveryRepository {
    pub async fn find_by_order(conn: &mut Conn, order_id: i64) -> DbResult<Option<Delivery>> {
        let sql = format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE order_id = ?1");
        let delivery = sqlx::query_as::<_, Delivery>(&sql)
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(delivery)
    }

    pub async fn insert(conn: &mut Conn, delivery: &NewDelivery) -> DbResult<Delivery> {
        debug!(order_id = delivery.order_id, "Inserting delivery");

        let s = &delivery.snapshot;
        let sql = format!(
            "INSERT INTO deliveries (order_id, country_name, governorate_name, area_name, block, \
                street, house, avenue, directions, delivery_status, payment_method, \
                delivery_datetime, notes, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14) \
             RETURNING {DELIVERY_COLUMNS}"
        );

        sqlx::query_as::<_, Delivery>(&sql)
            .bind(delivery.order_id)
            .bind(&s.country_name)
            .bind(&s.governorate_name)
            .bind(&s.area_name)
            .bind(&s.block)
            .bind(&s.street)
            .bind(&s.house)
            .bind(&s.avenue)
            .bind(&s.directions)
            .bind(DeliveryStatus::Pending)
            .bind(delivery.payment_method)
            .bind(delivery.delivery_datetime)
            .bind(&delivery.notes)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => {
                    DbError::duplicate(field, delivery.order_id.to_string())
                }
                other => other,
            })
    }

    /// Writes the snapshot, status and schedule of `delivery`.
    pub async fn update(conn: &mut Conn, delivery: &Delivery) -> DbResult<()> {
        debug!(delivery_id = delivery.id, status = %delivery.delivery_status, "Updating delivery");

        let result = sqlx::query(
            "UPDATE deliveries SET country_name = ?2, governorate_name = ?3, area_name = ?4, \
                block = ?5, street = ?6, house = ?7, avenue = ?8, directions = ?9, \
                delivery_status = ?10, payment_method = ?11, delivery_datetime = ?12, \
                received_datetime = ?13, notes = ?14, updated_at = ?15 \
             WHERE id = ?1",
        )
        .bind(delivery.id)
        .bind(&delivery.country_name)
        .bind(&delivery.governorate_name)
        .bind(&delivery.area_name)
        .bind(&delivery.block)
        .bind(&delivery.street)
        .bind(&delivery.house)
        .bind(&delivery.avenue)
        .bind(&delivery.directions)
        .bind(delivery.delivery_status)
        .bind(delivery.payment_method)
        .bind(delivery.delivery_datetime)
        .bind(delivery.received_datetime)
        .bind(&delivery.notes)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Delivery", delivery.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::order::{NewOrder, OrderRepository};
    use crate::{Database, DbConfig};
    use souq_core::{DeliveryType, Money, OrderSource, OrderStatus};

    #[tokio::test]
    async fn test_insert_update_and_uniqueness() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let order = OrderRepository::insert(
            &mut conn,
            &NewOrder {
                order_number: "CALS-2026-000001".into(),
                source: OrderSource::CallCenter,
                customer_id: None,
                charity_id: None,
                delivery_type: DeliveryType::Delivery,
                payment_method: PaymentMethod::Cash,
                status: OrderStatus::Pending,
                total_amount: Money::from_minor(1_000),
                notes: None,
            },
        )
        .await
        .unwrap();

        let new_delivery = NewDelivery {
            order_id: order.id,
            snapshot: AddressSnapshot {
                area_name: Some("Salmiya".into()),
                block: Some("4".into()),
                ..Default::default()
            },
            payment_method: PaymentMethod::Cash,
            delivery_datetime: Utc::now(),
            notes: None,
        };

        let mut delivery = DeliveryRepository::insert(&mut conn, &new_delivery).await.unwrap();
        assert_eq!(delivery.delivery_status, DeliveryStatus::Pending);
        assert_eq!(delivery.area_name.as_deref(), Some("Salmiya"));

        let err = DeliveryRepository::insert(&mut conn, &new_delivery).await.unwrap_err();
        assert!(err.is_unique_violation());

        delivery.delivery_status = DeliveryStatus::Cancelled;
        DeliveryRepository::update(&mut conn, &delivery).await.unwrap();
        let stored = DeliveryRepository::find_by_order(&mut conn, order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.delivery_status, DeliveryStatus::Cancelled);
    }
}
