//! # Delivery Snapshotter
//!
//! Copies display-ready address names onto the delivery row so later edits
//! to areas or saved addresses never rewrite a shipped order.
//!
//! ## Address Resolution
//! ```text
//! address_id ─▶ saved address (must belong to the order's customer)
//!      │ none
//!      ▼
//! area_id ────▶ country / governorate / area names
//!      │ none
//!      ▼
//! street-level fields only
//!
//! block / street / house / avenue / directions overlay the result
//! ```

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use souq_core::{
    AddressSnapshot, CoreError, Delivery, DeliveryStatus, DeliveryType, Order, ValidationError,
    DEFAULT_DELIVERY_LEAD_DAYS,
};
use souq_db::{CatalogRepository, Conn, CustomerRepository, DeliveryRepository, NewDelivery};

use crate::commands::DeliveryDetails;
use crate::error::FulfillmentResult;

#[derive(Debug, Clone, Copy)]
pub struct DeliverySnapshotter;

impl DeliverySnapshotter {
    /// Resolves `details` into an address snapshot.
    pub async fn resolve(
        conn: &mut Conn,
        customer_id: Option<i64>,
        details: &DeliveryDetails,
    ) -> FulfillmentResult<AddressSnapshot> {
        let mut snapshot = if let Some(address_id) = details.address_id {
            let address = CustomerRepository::find_address(conn, address_id)
                .await?
                .filter(|a| Some(a.customer_id) == customer_id)
                .ok_or_else(|| CoreError::not_found("CustomerAddress", address_id))?;
            address.snapshot
        } else if let Some(area_id) = details.area_id {
            CatalogRepository::area_snapshot(conn, area_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Area", area_id))?
        } else {
            AddressSnapshot::default()
        };

        overlay(&mut snapshot, details);
        Ok(snapshot)
    }

    /// Creates the order's delivery unless one exists.
    pub async fn create(
        conn: &mut Conn,
        order: &Order,
        details: &DeliveryDetails,
        now: DateTime<Utc>,
    ) -> FulfillmentResult<Delivery> {
        if let Some(existing) = DeliveryRepository::find_by_order(conn, order.id).await? {
            return Ok(existing);
        }

        let snapshot = Self::resolve(conn, order.customer_id, details).await?;
        let delivery = DeliveryRepository::insert(
            conn,
            &NewDelivery {
                order_id: order.id,
                snapshot,
                payment_method: order.payment_method,
                delivery_datetime: details
                    .delivery_datetime
                    .unwrap_or_else(|| now + Duration::days(DEFAULT_DELIVERY_LEAD_DAYS)),
                notes: details.notes.clone(),
            },
        )
        .await?;

        info!(order_id = order.id, delivery_id = delivery.id, "Delivery created");
        Ok(delivery)
    }

    /// Brings the delivery in line with an updated order.
    ///
    /// Only supplied fields are overwritten; a new `address_id` or `area_id`
    /// re-snapshots the whole address. Switching the order to pickup cancels
    /// an open delivery.
    pub async fn sync(
        conn: &mut Conn,
        order: &Order,
        details: Option<&DeliveryDetails>,
        now: DateTime<Utc>,
    ) -> FulfillmentResult<Option<Delivery>> {
        let existing = DeliveryRepository::find_by_order(conn, order.id).await?;

        if order.delivery_type == DeliveryType::Pickup {
            return match existing {
                Some(delivery) if !delivery.delivery_status.is_terminal() => {
                    Ok(Some(Self::cancel_delivery(conn, delivery).await?))
                }
                other => Ok(other),
            };
        }

        let Some(mut delivery) = existing else {
            let details = details.ok_or_else(|| ValidationError::Required {
                field: "delivery".into(),
            })?;
            return Ok(Some(Self::create(conn, order, details, now).await?));
        };

        if delivery.delivery_status == DeliveryStatus::Cancelled {
            delivery.delivery_status = DeliveryStatus::Pending;
        }
        delivery.payment_method = order.payment_method;

        if let Some(details) = details {
            if details.address_id.is_some() || details.area_id.is_some() {
                let snapshot = Self::resolve(conn, order.customer_id, details).await?;
                write_snapshot(&mut delivery, snapshot);
            } else {
                let mut snapshot = read_snapshot(&delivery);
                overlay(&mut snapshot, details);
                write_snapshot(&mut delivery, snapshot);
            }
            if let Some(at) = details.delivery_datetime {
                delivery.delivery_datetime = at;
            }
            if details.notes.is_some() {
                delivery.notes = details.notes.clone();
            }
        }

        DeliveryRepository::update(conn, &delivery).await?;
        debug!(order_id = order.id, delivery_id = delivery.id, "Delivery synced");
        Ok(Some(delivery))
    }

    /// Cancels the order's delivery if it is still open.
    pub async fn cancel(conn: &mut Conn, order_id: i64) -> FulfillmentResult<Option<Delivery>> {
        match DeliveryRepository::find_by_order(conn, order_id).await? {
            Some(delivery) if !delivery.delivery_status.is_terminal() => {
                Ok(Some(Self::cancel_delivery(conn, delivery).await?))
            }
            other => Ok(other),
        }
    }

    async fn cancel_delivery(conn: &mut Conn, mut delivery: Delivery) -> FulfillmentResult<Delivery> {
        delivery.delivery_status = DeliveryStatus::Cancelled;
        DeliveryRepository::update(conn, &delivery).await?;
        info!(order_id = delivery.order_id, delivery_id = delivery.id, "Delivery cancelled");
        Ok(delivery)
    }
}

fn overlay(snapshot: &mut AddressSnapshot, details: &DeliveryDetails) {
    let fields = [
        (&mut snapshot.block, &details.block),
        (&mut snapshot.street, &details.street),
        (&mut snapshot.house, &details.house),
        (&mut snapshot.avenue, &details.avenue),
        (&mut snapshot.directions, &details.directions),
    ];
    for (target, value) in fields {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            *target = Some(value.to_string());
        }
    }
}

fn read_snapshot(delivery: &Delivery) -> AddressSnapshot {
    AddressSnapshot {
        country_name: delivery.country_name.clone(),
        governorate_name: delivery.governorate_name.clone(),
        area_name: delivery.area_name.clone(),
        block: delivery.block.clone(),
        street: delivery.street.clone(),
        house: delivery.house.clone(),
        avenue: delivery.avenue.clone(),
        directions: delivery.directions.clone(),
    }
}

fn write_snapshot(delivery: &mut Delivery, snapshot: AddressSnapshot) {
    delivery.country_name = snapshot.country_name;
    delivery.governorate_name = snapshot.governorate_name;
    delivery.area_name = snapshot.area_name;
    delivery.block = snapshot.block;
    delivery.street = snapshot.street;
    delivery.house = snapshot.house;
    delivery.avenue = snapshot.avenue;
    delivery.directions = snapshot.directions;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_overlay_ignores_blank_fields() {
        let mut snapshot = AddressSnapshot {
            area_name: Some("Salmiya".into()),
            block: Some("4".into()),
            ..AddressSnapshot::default()
        };
        let details = DeliveryDetails {
            block: Some("  ".into()),
            street: Some(" 12 ".into()),
            ..DeliveryDetails::default()
        };
        overlay(&mut snapshot, &details);
        assert_eq!(snapshot.block.as_deref(), Some("4"));
        assert_eq!(snapshot.street.as_deref(), Some("12"));
        assert_eq!(snapshot.area_name.as_deref(), Some("Salmiya"));
    }

    #[tokio::test]
    async fn test_address_must_belong_to_customer() {
        let fx = testing::fixture().await;
        let owner = testing::seed_customer(&fx.db, "Owner", 0, 0).await;
        let other = testing::seed_customer(&fx.db, "Other", 0, 0).await;
        let address = testing::seed_address(&fx.db, owner).await;
        let details = DeliveryDetails {
            address_id: Some(address),
            house: Some("7".into()),
            ..DeliveryDetails::default()
        };

        let mut conn = fx.db.pool().acquire().await.unwrap();
        let snapshot = DeliverySnapshotter::resolve(&mut conn, Some(owner), &details)
            .await
            .unwrap();
        assert_eq!(snapshot.country_name.as_deref(), Some("Kuwait"));
        assert_eq!(snapshot.area_name.as_deref(), Some("Salmiya"));
        assert_eq!(snapshot.house.as_deref(), Some("7"));

        let err = DeliverySnapshotter::resolve(&mut conn, Some(other), &details)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_sync_overwrites_only_supplied_fields() {
        let fx = testing::fixture().await;
        let customer = testing::seed_customer(&fx.db, "Fahad", 0, 0).await;
        let mut order = testing::seed_bare_order(&fx.db, Some(customer)).await;
        order.delivery_type = DeliveryType::Delivery;
        let area = testing::seed_area(&fx.db).await;
        let now = Utc::now();

        let mut tx = fx.db.begin().await.unwrap();
        let created = DeliverySnapshotter::create(
            &mut tx,
            &order,
            &DeliveryDetails {
                area_id: Some(area),
                block: Some("2".into()),
                street: Some("Gulf Road".into()),
                ..DeliveryDetails::default()
            },
            now,
        )
        .await
        .unwrap();
        assert_eq!(created.delivery_datetime, now + Duration::days(1));
        assert_eq!(created.delivery_status, DeliveryStatus::Pending);

        let synced = DeliverySnapshotter::sync(
            &mut tx,
            &order,
            Some(&DeliveryDetails {
                house: Some("15".into()),
                ..DeliveryDetails::default()
            }),
            now,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(synced.street.as_deref(), Some("Gulf Road"));
        assert_eq!(synced.house.as_deref(), Some("15"));
        assert_eq!(synced.area_name.as_deref(), Some("Salmiya"));

        order.delivery_type = DeliveryType::Pickup;
        let cancelled = DeliverySnapshotter::sync(&mut tx, &order, None, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.delivery_status, DeliveryStatus::Cancelled);
        tx.commit().await.unwrap();
    }
}
