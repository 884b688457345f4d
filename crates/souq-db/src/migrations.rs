//! Embedded schema migrations from `migrations/sqlite/`.
//!
//! Files are applied in version order and recorded in `_sqlx_migrations`.
//! An applied file is never edited; schema changes go in a new
//! `NNN_description.sql`.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

pub async fn run(pool: &SqlitePool) -> DbResult<()> {
    let pending = pending(pool).await?;
    if pending.is_empty() {
        return Ok(());
    }
    info!(?pending, "Applying migrations");
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Versions embedded in the binary but not yet applied.
pub async fn pending(pool: &SqlitePool) -> DbResult<Vec<i64>> {
    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
        .fetch_all(pool)
        .await
        .unwrap_or_default();

    Ok(MIGRATOR
        .iter()
        .map(|m| m.version)
        .filter(|v| !applied.contains(v))
        .collect())
}
