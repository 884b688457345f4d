//! # Catalog Repository
//!
//! Product variants with their stock counts, plus the reference data
//! (countries, governorates, areas, charities) orders point at.
//!
//! ## Stock Updates
//! ```text
//! reserve:  UPDATE … SET quantity = quantity - n WHERE id = ? AND quantity >= n
//!           0 rows → variant missing, or not enough stock
//! release:  UPDATE … SET quantity = quantity + n WHERE id = ?
//! ```
//! Both run inside the caller's transaction; the conditional decrement means
//! stock can never go negative even under concurrent orders.

use sqlx::QueryBuilder;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::Conn;
use souq_core::{AddressSnapshot, Money, ProductVariant};

const VARIANT_COLUMNS: &str = "v.id, v.product_id, p.name AS product_name, v.sku, v.price, \
                               v.quantity, v.is_active";

/// Repository for catalog and reference data.
#[derive(Debug, Clone, Copy)]
pub struct CatalogRepository;

impl CatalogRepository {
    // -------------------------------------------------------------------------
    // Variants
    // -------------------------------------------------------------------------

    pub async fn find_variant(conn: &mut Conn, id: i64) -> DbResult<Option<ProductVariant>> {
        let sql = format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants v \
             JOIN products p ON p.id = v.product_id WHERE v.id = ?1"
        );
        let variant = sqlx::query_as::<_, ProductVariant>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(variant)
    }

    /// Loads the given variants keyed by id. Missing ids are simply absent.
    pub async fn find_variants(
        conn: &mut Conn,
        ids: &[i64],
    ) -> DbResult<HashMap<i64, ProductVariant>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::new(format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants v \
             JOIN products p ON p.id = v.product_id WHERE v.id IN ("
        ));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let variants = query
            .build_query_as::<ProductVariant>()
            .fetch_all(&mut *conn)
            .await?;

        Ok(variants.into_iter().map(|v| (v.id, v)).collect())
    }

    /// Decrements stock if at least `quantity` units are available.
    ///
    /// Returns `false` when the variant is missing or short; the caller
    /// decides which domain error that is.
    pub async fn reserve(conn: &mut Conn, variant_id: i64, quantity: i64) -> DbResult<bool> {
        debug!(variant_id, quantity, "Reserving stock");

        let result = sqlx::query(
            "UPDATE product_variants SET quantity = quantity - ?2 \
             WHERE id = ?1 AND quantity >= ?2",
        )
        .bind(variant_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Adds `quantity` units back.
    pub async fn release(conn: &mut Conn, variant_id: i64, quantity: i64) -> DbResult<()> {
        debug!(variant_id, quantity, "Releasing stock");

        let result = sqlx::query("UPDATE product_variants SET quantity = quantity + ?2 WHERE id = ?1")
            .bind(variant_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductVariant", variant_id));
        }
        Ok(())
    }

    pub async fn insert_product(conn: &mut Conn, name: &str) -> DbResult<i64> {
        let id = sqlx::query("INSERT INTO products (name) VALUES (?1)")
            .bind(name)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    pub async fn insert_variant(
        conn: &mut Conn,
        product_id: i64,
        sku: &str,
        price: Money,
        quantity: i64,
    ) -> DbResult<i64> {
        debug!(product_id, sku, "Inserting variant");

        let id = sqlx::query(
            "INSERT INTO product_variants (product_id, sku, price, quantity) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(product_id)
        .bind(sku)
        .bind(price)
        .bind(quantity)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, sku),
            other => other,
        })?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn set_variant_active(conn: &mut Conn, variant_id: i64, active: bool) -> DbResult<()> {
        sqlx::query("UPDATE product_variants SET is_active = ?2 WHERE id = ?1")
            .bind(variant_id)
            .bind(active)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reference data
    // -------------------------------------------------------------------------

    pub async fn insert_country(conn: &mut Conn, name: &str) -> DbResult<i64> {
        let id = sqlx::query("INSERT INTO countries (name) VALUES (?1)")
            .bind(name)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    pub async fn insert_governorate(conn: &mut Conn, country_id: i64, name: &str) -> DbResult<i64> {
        let id = sqlx::query("INSERT INTO governorates (country_id, name) VALUES (?1, ?2)")
            .bind(country_id)
            .bind(name)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    pub async fn insert_area(conn: &mut Conn, governorate_id: i64, name: &str) -> DbResult<i64> {
        let id = sqlx::query("INSERT INTO areas (governorate_id, name) VALUES (?1, ?2)")
            .bind(governorate_id)
            .bind(name)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    pub async fn insert_charity(conn: &mut Conn, name: &str) -> DbResult<i64> {
        let id = sqlx::query("INSERT INTO charities (name) VALUES (?1)")
            .bind(name)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    /// Display names for an area, with its governorate and country.
    ///
    /// Street-level fields are left empty for the caller to fill.
    pub async fn area_snapshot(conn: &mut Conn, area_id: i64) -> DbResult<Option<AddressSnapshot>> {
        let snapshot = sqlx::query_as::<_, AddressSnapshot>(
            "SELECT c.name AS country_name, g.name AS governorate_name, a.name AS area_name, \
                    NULL AS block, NULL AS street, NULL AS house, NULL AS avenue, NULL AS directions \
             FROM areas a \
             JOIN governorates g ON g.id = a.governorate_id \
             JOIN countries c ON c.id = g.country_id \
             WHERE a.id = ?1",
        )
        .bind(area_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let product = CatalogRepository::insert_product(&mut conn, "Dates 1kg").await.unwrap();
        let variant = CatalogRepository::insert_variant(
            &mut conn,
            product,
            "DATES-1KG",
            Money::from_minor(2_500),
            5,
        )
        .await
        .unwrap();
        (db, variant)
    }

    #[tokio::test]
    async fn test_find_variant_joins_product_name() {
        let (db, id) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let variant = CatalogRepository::find_variant(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(variant.product_name, "Dates 1kg");
        assert_eq!(variant.price, Money::from_minor(2_500));
        assert!(variant.is_active);

        let many = CatalogRepository::find_variants(&mut conn, &[id, 999]).await.unwrap();
        assert_eq!(many.len(), 1);
    }

    #[tokio::test]
    async fn test_reserve_never_goes_negative() {
        let (db, id) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(CatalogRepository::reserve(&mut conn, id, 3).await.unwrap());
        assert!(!CatalogRepository::reserve(&mut conn, id, 3).await.unwrap());
        assert!(!CatalogRepository::reserve(&mut conn, 999, 1).await.unwrap());

        CatalogRepository::release(&mut conn, id, 1).await.unwrap();
        let variant = CatalogRepository::find_variant(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(variant.quantity, 3);
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let (db, _) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let product = CatalogRepository::insert_product(&mut conn, "Other").await.unwrap();

        let err = CatalogRepository::insert_variant(&mut conn, product, "DATES-1KG", Money::zero(), 1)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_area_snapshot() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let country = CatalogRepository::insert_country(&mut conn, "Kuwait").await.unwrap();
        let gov = CatalogRepository::insert_governorate(&mut conn, country, "Hawalli").await.unwrap();
        let area = CatalogRepository::insert_area(&mut conn, gov, "Salmiya").await.unwrap();

        let snapshot = CatalogRepository::area_snapshot(&mut conn, area).await.unwrap().unwrap();
        assert_eq!(snapshot.country_name.as_deref(), Some("Kuwait"));
        assert_eq!(snapshot.governorate_name.as_deref(), Some("Hawalli"));
        assert_eq!(snapshot.area_name.as_deref(), Some("Salmiya"));
        assert!(snapshot.block.is_none());
    }
}
