//! # souq-engine: Transactional Fulfillment Services
//!
//! Every operation that moves stock, points or money runs here, inside one
//! database transaction, and records its activity only after commit.
//!
//! ## Services
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OrderService            create / update / read orders                  │
//! │  PaymentService          gateway links for invoices and wallet top-ups  │
//! │  ReconciliationService   success / cancel redirects, webhooks           │
//! │  CancellationService     cancel orders, approve / reject refunds        │
//! │  WalletService           points → wallet conversion, balances           │
//! │                                                                         │
//! │  built on the in-transaction ledgers:                                   │
//! │  InventoryLedger  PointsLedger  WalletLedger  InvoiceService            │
//! │  DeliverySnapshotter                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use souq_engine::{Engine, EngineContext};
//!
//! let engine = Engine::new(EngineContext::with_defaults(db), gateway);
//! let details = engine.orders.create_order(cmd).await?;
//! let link = engine.payments.initiate_online_payment(details.order.id).await?;
//! ```

pub mod activity;
pub mod cancellation;
pub mod commands;
pub mod context;
pub mod delivery;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod invoice;
pub mod numbering;
pub mod orchestrator;
pub mod points;
pub mod reconciliation;
pub mod settings;
pub mod wallet;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use activity::{Activity, ActivityLogger, RecordingActivityLogger, TracingActivityLogger};
pub use cancellation::{CancellationOutcome, CancellationService, RefundDecision};
pub use commands::{
    CreateOrderCommand, DeliveryDetails, OfferSelection, OrderLineRequest, UpdateOrderCommand,
};
pub use context::EngineContext;
pub use error::{FulfillmentError, FulfillmentResult};
pub use gateway::{PaymentGateway, PaymentInitiation, PaymentLink, PaymentLinkRequest, PaymentService};
pub use orchestrator::{OrderDetails, OrderService};
pub use reconciliation::{ReconciliationOutcome, ReconciliationService};
pub use settings::{SettingsProvider, StaticSettings};
pub use wallet::{PointsConversion, WalletService};

/// All services over one shared context.
#[derive(Debug, Clone)]
pub struct Engine {
    pub orders: OrderService,
    pub payments: PaymentService,
    pub reconciliation: ReconciliationService,
    pub cancellations: CancellationService,
    pub wallet: WalletService,
}

impl Engine {
    pub fn new(ctx: EngineContext, gateway: Arc<dyn PaymentGateway>) -> Self {
        Engine {
            orders: OrderService::new(ctx.clone()),
            payments: PaymentService::new(ctx.clone(), gateway),
            reconciliation: ReconciliationService::new(ctx.clone()),
            cancellations: CancellationService::new(ctx.clone()),
            wallet: WalletService::new(ctx),
        }
    }
}
