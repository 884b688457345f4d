//! # Customer Repository
//!
//! Customers, their loyalty point balance and saved addresses.

use chrono::Utc;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::Conn;
use souq_core::{AddressSnapshot, Customer};

/// A saved address with its owner and resolved display names.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerAddress {
    pub id: i64,
    pub customer_id: i64,
    #[sqlx(flatten)]
    pub snapshot: AddressSnapshot,
}

/// Fields of a saved address.
#[derive(Debug, Clone, Default)]
pub struct NewAddress {
    pub area_id: i64,
    pub block: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub avenue: Option<String>,
    pub directions: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct CustomerRepository;

impl CustomerRepository {
    pub async fn find_by_id(conn: &mut Conn, id: i64) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, phone, points, created_at FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(customer)
    }

    pub async fn get(conn: &mut Conn, id: i64) -> DbResult<Customer> {
        Self::find_by_id(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn insert(conn: &mut Conn, name: &str, phone: Option<&str>) -> DbResult<i64> {
        debug!(name, "Inserting customer");

        let id = sqlx::query("INSERT INTO customers (name, phone, created_at) VALUES (?1, ?2, ?3)")
            .bind(name)
            .bind(phone)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    /// Adds `delta` points (negative to remove). Never drops below zero.
    pub async fn adjust_points(conn: &mut Conn, id: i64, delta: i64) -> DbResult<i64> {
        debug!(customer_id = id, delta, "Adjusting points");

        let points: Option<i64> = sqlx::query_scalar(
            "UPDATE customers SET points = MAX(points + ?2, 0) WHERE id = ?1 RETURNING points",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&mut *conn)
        .await?;

        points.ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn insert_address(
        conn: &mut Conn,
        customer_id: i64,
        address: &NewAddress,
    ) -> DbResult<i64> {
        let id = sqlx::query(
            "INSERT INTO customer_addresses \
                (customer_id, area_id, block, street, house, avenue, directions) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(customer_id)
        .bind(address.area_id)
        .bind(&address.block)
        .bind(&address.street)
        .bind(&address.house)
        .bind(&address.avenue)
        .bind(&address.directions)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Loads a saved address with country / governorate / area names resolved.
    pub async fn find_address(conn: &mut Conn, address_id: i64) -> DbResult<Option<CustomerAddress>> {
        let address = sqlx::query_as::<_, CustomerAddress>(
            "SELECT ca.id, ca.customer_id, \
                    c.name AS country_name, g.name AS governorate_name, a.name AS area_name, \
                    ca.block, ca.street, ca.house, ca.avenue, ca.directions \
             FROM customer_addresses ca \
             JOIN areas a ON a.id = ca.area_id \
             JOIN governorates g ON g.id = a.governorate_id \
             JOIN countries c ON c.id = g.country_id \
             WHERE ca.id = ?1",
        )
        .bind(address_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CatalogRepository, Database, DbConfig};

    #[tokio::test]
    async fn test_points_clamp_at_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let id = CustomerRepository::insert(&mut conn, "Fatima", Some("+96550000001"))
            .await
            .unwrap();

        assert_eq!(CustomerRepository::adjust_points(&mut conn, id, 30).await.unwrap(), 30);
        assert_eq!(CustomerRepository::adjust_points(&mut conn, id, -50).await.unwrap(), 0);

        let err = CustomerRepository::adjust_points(&mut conn, 999, 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_address_resolves_names() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let country = CatalogRepository::insert_country(&mut conn, "Kuwait").await.unwrap();
        let gov = CatalogRepository::insert_governorate(&mut conn, country, "Capital").await.unwrap();
        let area = CatalogRepository::insert_area(&mut conn, gov, "Sharq").await.unwrap();
        let customer = CustomerRepository::insert(&mut conn, "Omar", None).await.unwrap();

        let address_id = CustomerRepository::insert_address(
            &mut conn,
            customer,
            &NewAddress {
                area_id: area,
                block: Some("3".into()),
                street: Some("12".into()),
                house: Some("7".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let address = CustomerRepository::find_address(&mut conn, address_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(address.customer_id, customer);
        assert_eq!(address.snapshot.area_name.as_deref(), Some("Sharq"));
        assert_eq!(address.snapshot.block.as_deref(), Some("3"));
        assert!(address.snapshot.avenue.is_none());
    }
}
