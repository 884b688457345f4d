//! # Settings Repository
//!
//! Plain key/value rows (`tax_rate`, `point_value`, `wallet_bonus_rate`).
//! Values are stored as text; parsing belongs to the caller.

use std::collections::HashMap;

use crate::error::DbResult;
use crate::Conn;

#[derive(Debug, Clone, Copy)]
pub struct SettingsRepository;

impl SettingsRepository {
    pub async fn get(conn: &mut Conn, key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(value)
    }

    pub async fn set(conn: &mut Conn, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn all(conn: &mut Conn) -> DbResult<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_set_overwrites() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(SettingsRepository::get(&mut conn, "tax_rate").await.unwrap().is_none());
        SettingsRepository::set(&mut conn, "tax_rate", "0.15").await.unwrap();
        SettingsRepository::set(&mut conn, "tax_rate", "0.05").await.unwrap();

        assert_eq!(
            SettingsRepository::get(&mut conn, "tax_rate").await.unwrap().as_deref(),
            Some("0.05")
        );
        assert_eq!(SettingsRepository::all(&mut conn).await.unwrap().len(), 1);
    }
}
