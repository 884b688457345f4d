//! # souq-core: Pure Business Logic for Souq Fulfillment
//!
//! This crate is the **heart** of the order-fulfillment and payment-settlement
//! engine. It contains every monetary rule as a pure function with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Souq Architecture                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    souq-api (axum)                              │   │
//! │  │    orders, refunds, payment callbacks, wallet, points           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             souq-engine (transactional services)                │   │
//! │  │    Orchestrator, Reconciliation, Cancellation, Ledgers          │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼───────────────┐  ┌───────────▼───────────────────┐   │
//! │  │  ★ souq-core (THIS CRATE) ★  │  │  souq-db (SQLite via sqlx)    │   │
//! │  │                               │  │  repositories, migrations     │   │
//! │  │  money  offer  points         │  └───────────────────────────────┘   │
//! │  │  invoice  wallet  inventory   │                                      │
//! │  │  numbering  gateway           │                                      │
//! │  │                               │                                      │
//! │  │  NO I/O • NO DATABASE • PURE  │                                      │
//! │  └───────────────────────────────┘                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` (three-decimal minor units) and `Rate` (basis points)
//! - [`types`] - Domain entities and their status enums / state machines
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Input validation
//! - [`offer`] - Offer Evaluation Engine
//! - [`points`] - Loyalty points discount arithmetic
//! - [`invoice`] - Invoice amount calculation
//! - [`wallet`] - Wallet balance rules
//! - [`inventory`] - Stock delta computation for order updates
//! - [`numbering`] - Order / invoice / payment identifiers
//! - [`gateway`] - Payment gateway callback normalization
//!
//! ## Example Usage
//!
//! ```rust
//! use souq_core::invoice::calculate_amounts;
//! use souq_core::money::{Money, Rate};
//!
//! // 20.000 subtotal, 5.000 offer discount, no points, 15% tax
//! let amounts = calculate_amounts(
//!     Money::from_minor(20_000),
//!     Money::from_minor(5_000),
//!     Money::zero(),
//!     Rate::from_bps(1500),
//! );
//!
//! assert_eq!(amounts.amount_due, Money::from_minor(17_250));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod gateway;
pub mod inventory;
pub mod invoice;
pub mod money;
pub mod numbering;
pub mod offer;
pub mod points;
pub mod types;
pub mod validation;
pub mod wallet;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed on a single order.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum number of times one offer may be applied to a single order.
pub const MAX_OFFER_QUANTITY: i64 = 50;

/// Default days between order creation and the scheduled delivery.
pub const DEFAULT_DELIVERY_LEAD_DAYS: i64 = 1;
