//! # souq-db
//!
//! SQLite persistence for the fulfillment engine. Repositories are stateless
//! namespaces of async functions over a borrowed [`Conn`]; the engine owns
//! every transaction boundary.
//!
//! ```text
//! souq-engine (OrderService::create_order)
//!      │  let mut tx = db.begin().await?;
//!      ▼
//! OrderRepository / InvoiceRepository / PaymentRepository / ...
//!      │  &mut *tx
//!      ▼
//! SQLite (WAL, foreign keys, CHECK >= 0 on stock, points, balances)
//! ```
//!
//! Unique indexes carry the idempotency rules: one invoice and one delivery
//! per order, one payment per `(invoice_id, receipt_id)`, one payment per
//! wallet-charge reference.
//!
//! ```rust,ignore
//! use souq_db::{Database, DbConfig, OrderRepository};
//!
//! let db = Database::new(DbConfig::new("souq.db")).await?;
//! let mut tx = db.begin().await?;
//! let order = OrderRepository::find_by_number(&mut *tx, "APPS-2026-000001").await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::catalog::CatalogRepository;
pub use repository::customer::{CustomerAddress, CustomerRepository, NewAddress};
pub use repository::delivery::{DeliveryRepository, NewDelivery};
pub use repository::invoice::{InvoiceRepository, NewInvoice};
pub use repository::offer::{NewOffer, OfferRepository};
pub use repository::order::{NewOrder, OrderRepository};
pub use repository::payment::{NewPayment, PaymentRepository};
pub use repository::points::PointsRepository;
pub use repository::refund::RefundRepository;
pub use repository::settings::SettingsRepository;
pub use repository::wallet::WalletRepository;

/// Connection type every repository function runs on. Pass `&mut *tx` for a
/// transaction or `&mut *conn` for a pooled connection.
pub type Conn = sqlx::SqliteConnection;
