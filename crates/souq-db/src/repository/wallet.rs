//! # Wallet Repository
//!
//! One wallet per customer. The balance column carries `CHECK (balance >= 0)`,
//! so a buggy debit fails loudly instead of going negative.

use chrono::Utc;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::Conn;
use souq_core::{Money, Wallet};

#[derive(Debug, Clone, Copy)]
pub struct WalletRepository;

impl WalletRepository {
    pub async fn find_by_customer(conn: &mut Conn, customer_id: i64) -> DbResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT id, customer_id, balance, updated_at FROM wallets WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(wallet)
    }

    /// Returns the customer's wallet, creating an empty one on first use.
    pub async fn get_or_create(conn: &mut Conn, customer_id: i64) -> DbResult<Wallet> {
        if let Some(wallet) = Self::find_by_customer(conn, customer_id).await? {
            return Ok(wallet);
        }

        debug!(customer_id, "Creating wallet");
        let wallet = sqlx::query_as::<_, Wallet>(
            "INSERT INTO wallets (customer_id, balance, updated_at) VALUES (?1, 0, ?2) \
             RETURNING id, customer_id, balance, updated_at",
        )
        .bind(customer_id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;
        Ok(wallet)
    }

    pub async fn set_balance(conn: &mut Conn, wallet_id: i64, balance: Money) -> DbResult<()> {
        debug!(wallet_id, balance = %balance, "Setting wallet balance");

        let result = sqlx::query("UPDATE wallets SET balance = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(wallet_id)
            .bind(balance)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Wallet", wallet_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CustomerRepository, Database, DbConfig};

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let customer = CustomerRepository::insert(&mut conn, "Sara", None).await.unwrap();

        let first = WalletRepository::get_or_create(&mut conn, customer).await.unwrap();
        let second = WalletRepository::get_or_create(&mut conn, customer).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.balance.is_zero());
    }

    #[tokio::test]
    async fn test_negative_balance_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let customer = CustomerRepository::insert(&mut conn, "Sara", None).await.unwrap();
        let wallet = WalletRepository::get_or_create(&mut conn, customer).await.unwrap();

        WalletRepository::set_balance(&mut conn, wallet.id, Money::from_minor(5_000))
            .await
            .unwrap();
        let err = WalletRepository::set_balance(&mut conn, wallet.id, Money::from_minor(-1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
