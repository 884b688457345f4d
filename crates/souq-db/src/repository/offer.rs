//! # Offer Repository
//!
//! Offers are read as a whole: the offer row plus its conditions and
//! rewards, assembled into an [`OfferDefinition`].

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::DbResult;
use crate::Conn;
use souq_core::{
    DiscountType, Offer, OfferCondition, OfferDefinition, OfferReward, OfferType, RewardType,
};

/// Fields of a new offer.
#[derive(Debug, Clone)]
pub struct NewOffer {
    pub name: String,
    pub offer_type: OfferType,
    pub reward_type: RewardType,
    pub points: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct OfferRepository;

impl OfferRepository {
    pub async fn find_by_id(conn: &mut Conn, id: i64) -> DbResult<Option<Offer>> {
        let offer = sqlx::query_as::<_, Offer>(
            "SELECT id, name, offer_type, reward_type, points, is_active, start_date, end_date \
             FROM offers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(offer)
    }

    /// Loads an offer with all of its conditions and rewards.
    pub async fn find_definition(conn: &mut Conn, id: i64) -> DbResult<Option<OfferDefinition>> {
        let Some(offer) = Self::find_by_id(conn, id).await? else {
            return Ok(None);
        };

        let conditions = sqlx::query_as::<_, OfferCondition>(
            "SELECT id, offer_id, variant_id, quantity, is_active \
             FROM offer_conditions WHERE offer_id = ?1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let rewards = sqlx::query_as::<_, OfferReward>(
            "SELECT id, offer_id, variant_id, quantity, discount_value, discount_type, is_active \
             FROM offer_rewards WHERE offer_id = ?1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(OfferDefinition {
            offer,
            conditions,
            rewards,
        }))
    }

    pub async fn insert(conn: &mut Conn, offer: &NewOffer) -> DbResult<i64> {
        debug!(name = %offer.name, "Inserting offer");

        let id = sqlx::query(
            "INSERT INTO offers (name, offer_type, reward_type, points, start_date, end_date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&offer.name)
        .bind(offer.offer_type)
        .bind(offer.reward_type)
        .bind(offer.points)
        .bind(offer.start_date)
        .bind(offer.end_date)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn add_condition(
        conn: &mut Conn,
        offer_id: i64,
        variant_id: i64,
        quantity: i64,
    ) -> DbResult<i64> {
        let id = sqlx::query(
            "INSERT INTO offer_conditions (offer_id, variant_id, quantity) VALUES (?1, ?2, ?3)",
        )
        .bind(offer_id)
        .bind(variant_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn add_product_reward(
        conn: &mut Conn,
        offer_id: i64,
        variant_id: i64,
        quantity: i64,
    ) -> DbResult<i64> {
        let id = sqlx::query(
            "INSERT INTO offer_rewards (offer_id, variant_id, quantity) VALUES (?1, ?2, ?3)",
        )
        .bind(offer_id)
        .bind(variant_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Adds a discount reward. `value` is minor units for fixed discounts and
    /// basis points for percentages.
    pub async fn add_discount_reward(
        conn: &mut Conn,
        offer_id: i64,
        discount_type: DiscountType,
        value: i64,
    ) -> DbResult<i64> {
        let id = sqlx::query(
            "INSERT INTO offer_rewards (offer_id, discount_type, discount_value) VALUES (?1, ?2, ?3)",
        )
        .bind(offer_id)
        .bind(discount_type)
        .bind(value)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn set_active(conn: &mut Conn, offer_id: i64, active: bool) -> DbResult<()> {
        sqlx::query("UPDATE offers SET is_active = ?2 WHERE id = ?1")
            .bind(offer_id)
            .bind(active)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CatalogRepository, Database, DbConfig};
    use souq_core::Money;

    #[tokio::test]
    async fn test_definition_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let product = CatalogRepository::insert_product(&mut conn, "Water").await.unwrap();
        let variant = CatalogRepository::insert_variant(&mut conn, product, "W-1", Money::from_minor(500), 10)
            .await
            .unwrap();

        let offer_id = OfferRepository::insert(
            &mut conn,
            &NewOffer {
                name: "Buy 2 get 1".into(),
                offer_type: OfferType::Standard,
                reward_type: RewardType::Products,
                points: 5,
                start_date: None,
                end_date: None,
            },
        )
        .await
        .unwrap();
        OfferRepository::add_condition(&mut conn, offer_id, variant, 2).await.unwrap();
        OfferRepository::add_product_reward(&mut conn, offer_id, variant, 1).await.unwrap();

        let definition = OfferRepository::find_definition(&mut conn, offer_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(definition.offer.reward_type, RewardType::Products);
        assert_eq!(definition.conditions.len(), 1);
        assert_eq!(definition.rewards[0].variant_id, Some(variant));
        assert!(definition.rewards[0].discount_type.is_none());

        assert!(OfferRepository::find_definition(&mut conn, 999).await.unwrap().is_none());
    }
}
