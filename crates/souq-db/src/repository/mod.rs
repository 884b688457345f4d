//! # Repository Module
//!
//! Database repository implementations for Souq.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and Transactions                        │
//! │                                                                         │
//! │  Service (souq-engine)                                                  │
//! │       │  let mut tx = db.begin().await?;                                │
//! │       │                                                                 │
//! │       ├── CatalogRepository::reserve(&mut *tx, id, qty)                 │
//! │       ├── OrderRepository::insert(&mut *tx, &new_order)                 │
//! │       ├── InvoiceRepository::insert(&mut *tx, &new_invoice)             │
//! │       │                                                                 │
//! │       └── tx.commit()  (or drop → rollback)                             │
//! │                                                                         │
//! │  Repositories hold no state; the connection they run on decides which   │
//! │  unit of work the SQL belongs to.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Variants, stock, reference data
//! - [`customer::CustomerRepository`] - Customers, points balance, addresses
//! - [`wallet::WalletRepository`] - Wallet balances
//! - [`offer::OfferRepository`] - Offers with conditions and rewards
//! - [`order::OrderRepository`] - Orders, items, attached offers, numbering
//! - [`invoice::InvoiceRepository`] - Invoices
//! - [`payment::PaymentRepository`] - Payments and wallet top-ups
//! - [`delivery::DeliveryRepository`] - Delivery snapshots
//! - [`points::PointsRepository`] - Points history
//! - [`refund::RefundRepository`] - Refund requests
//! - [`settings::SettingsRepository`] - Key/value settings

pub mod catalog;
pub mod customer;
pub mod delivery;
pub mod invoice;
pub mod offer;
pub mod order;
pub mod payment;
pub mod points;
pub mod refund;
pub mod settings;
pub mod wallet;

/// Highest existing `{prefix}…` value of `column` in `table`, by sequence.
///
/// Longer values sort first so sequences past 999999 still win.
pub(crate) async fn last_with_prefix(
    conn: &mut crate::Conn,
    table: &str,
    column: &str,
    prefix: &str,
) -> crate::DbResult<Option<String>> {
    let sql = format!(
        "SELECT {column} FROM {table} WHERE {column} LIKE ?1 \
         ORDER BY length({column}) DESC, {column} DESC LIMIT 1"
    );
    let last: Option<String> = sqlx::query_scalar(&sql)
        .bind(format!("{prefix}%"))
        .fetch_optional(&mut *conn)
        .await?;
    Ok(last)
}
