//! # Domain Types
//!
//! Core domain types used throughout Souq.
//!
//! ## Aggregate Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Order Aggregate                                 │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │     Order       │──▶│    Invoice      │──▶│    Payment*     │        │
//! │  │  order_number   │   │  INV-{order}    │   │  PAY-{Y}-{SEQ}  │        │
//! │  │  status         │   │  amount_due     │   │  receipt_id     │        │
//! │  └───────┬─────────┘   └─────────────────┘   └─────────────────┘        │
//! │          │                                                              │
//! │          ├──▶ OrderItem*   (is_offer = paid / reward line)              │
//! │          ├──▶ OrderOffer*  (offer_id × quantity)                        │
//! │          ├──▶ Delivery?    (address snapshot)                           │
//! │          └──▶ RefundRequest? (online payments only)                     │
//! │                                                                         │
//! │  Customer ──▶ Wallet (balance ≥ 0)                                      │
//! │          └──▶ PointsTransaction* (append-only)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity has an integer `id`. Orders, invoices and payments also carry
//! a human-readable number (`APPS-2026-000001`, `INV-…`, `PAY-…`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

/// Implements `Display` from the enum's `as_str`.
macro_rules! display_as_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

// =============================================================================
// Order Status
// =============================================================================

/// Order lifecycle.
///
/// ```text
/// Pending ──▶ Processing ──▶ Completed
///    │            │
///    └────────────┴──▶ Cancelled
/// ```
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Forward-only moves. Staying in the same non-terminal state is allowed
    /// so updates can leave the status untouched.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (a, b) if *a == b => !a.is_terminal(),
            (Pending, Processing | Completed | Cancelled) => true,
            (Processing, Completed | Cancelled) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Order Source
// =============================================================================

/// Channel an order was placed through; selects the order number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    #[default]
    App,
    Web,
    CallCenter,
}

impl OrderSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSource::App => "app",
            OrderSource::Web => "web",
            OrderSource::CallCenter => "call_center",
        }
    }

    /// Order number prefix: `APPS`, `WEBS` or `CALS`.
    pub fn prefix(&self) -> &'static str {
        match self {
            OrderSource::App => "APPS",
            OrderSource::Web => "WEBS",
            OrderSource::CallCenter => "CALS",
        }
    }
}

// =============================================================================
// Delivery Type / Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    #[default]
    Pickup,
    Delivery,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::Pickup => "pickup",
            DeliveryType::Delivery => "delivery",
        }
    }
}

/// How an order (or a payment) is settled.
///
/// `Online` means settled through the external gateway; the gateway's own
/// payment records live in `payments`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Wallet,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Online => "online",
        }
    }
}

// =============================================================================
// Payment / Invoice / Delivery / Refund Status
// =============================================================================

/// Payment lifecycle: `Pending → Completed | Failed`, `Completed → Refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Pending | Completed | Failed) | (Completed, Refunded)
        )
    }
}

/// Invoice lifecycle.
///
/// ```text
/// Pending ◀──▶ Paid ──▶ Refunded
///    │          │          ▲
///    └──────────┴──▶ Cancelled
/// ```
/// `Paid → Pending` is the "mark unpaid" move used when an order switches away
/// from wallet payment. A cancelled invoice can still become refunded once an
/// approval-gated refund is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    Refunded,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Pending, Paid | Cancelled)
                | (Paid, Pending | Cancelled | Refunded)
                | (Cancelled, Refunded)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Assigned,
    InTransit,
    Delivered,
    Failed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Failed | DeliveryStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Approved => "approved",
            RefundStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PointsTransactionType {
    PointsEarned,
    PointsToWallet,
}

impl PointsTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointsTransactionType::PointsEarned => "points_earned",
            PointsTransactionType::PointsToWallet => "points_to_wallet",
        }
    }
}

// =============================================================================
// Offer Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    #[default]
    Standard,
    /// Only valid on charity-channel orders (no customer).
    Charity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Products,
    Discount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

display_as_str!(
    OrderStatus,
    OrderSource,
    DeliveryType,
    PaymentMethod,
    PaymentStatus,
    InvoiceStatus,
    DeliveryStatus,
    RefundStatus,
    PointsTransactionType,
);

// =============================================================================
// Catalog & Customer
// =============================================================================

/// A sellable product variant with its current stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductVariant {
    pub id: i64,
    pub product_id: i64,
    /// Joined from `products.name`.
    pub product_name: String,
    pub sku: String,
    pub price: Money,
    /// Units available; never negative.
    pub quantity: i64,
    pub is_active: bool,
}

impl ProductVariant {
    #[inline]
    pub fn has_stock(&self, requested: i64) -> bool {
        self.quantity >= requested
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    /// Loyalty point balance; never negative.
    pub points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Wallet {
    pub id: i64,
    pub customer_id: i64,
    pub balance: Money,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Resolved, display-ready address copied onto a delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AddressSnapshot {
    pub country_name: Option<String>,
    pub governorate_name: Option<String>,
    pub area_name: Option<String>,
    pub block: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub avenue: Option<String>,
    pub directions: Option<String>,
}

// =============================================================================
// Offers
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Offer {
    pub id: i64,
    pub name: String,
    pub offer_type: OfferType,
    pub reward_type: RewardType,
    /// Loyalty points granted per offer instance when the order completes.
    pub points: i64,
    pub is_active: bool,
    #[ts(as = "Option<String>")]
    pub start_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub end_date: Option<DateTime<Utc>>,
}

/// A cart line the customer must hold for the offer to apply.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OfferCondition {
    pub id: i64,
    pub offer_id: i64,
    pub variant_id: i64,
    pub quantity: i64,
    pub is_active: bool,
}

/// A benefit granted by the offer.
///
/// Product rewards carry `variant_id` + `quantity`. Discount rewards carry
/// `discount_value` + `discount_type`: a fixed value is in minor units, a
/// percentage value is in basis points (5000 = 50%).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OfferReward {
    pub id: i64,
    pub offer_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub discount_value: Option<i64>,
    pub discount_type: Option<DiscountType>,
    pub is_active: bool,
}

/// An offer with its conditions and rewards loaded.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OfferDefinition {
    pub offer: Offer,
    pub conditions: Vec<OfferCondition>,
    pub rewards: Vec<OfferReward>,
}

// =============================================================================
// Order Aggregate
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub source: OrderSource,
    /// `None` for charity-channel orders.
    pub customer_id: Option<i64>,
    pub charity_id: Option<i64>,
    pub delivery_type: DeliveryType,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    /// Sum of every line, reward lines included.
    pub total_amount: Money,
    /// Set once completion points have been credited.
    pub points_awarded: bool,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A line on an order, with catalog data frozen at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub variant_id: i64,
    pub name: String,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub total_price: Money,
    /// `true` for lines granted by an offer reward.
    pub is_offer: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderOffer {
    pub order_id: i64,
    pub offer_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: i64,
    pub order_id: i64,
    pub invoice_number: String,
    pub subtotal: Money,
    pub offer_discount: Money,
    pub points_discount: Money,
    pub total_discount: Money,
    pub tax_amount: Money,
    pub amount_due: Money,
    pub used_points: i64,
    pub status: InvoiceStatus,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }
}

/// A payment against an invoice, or a stand-alone wallet top-up
/// (`invoice_id = None`, `reference = WCH-…`).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: i64,
    pub payment_number: String,
    pub invoice_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub reference: Option<String>,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub receipt_id: Option<String>,
    pub transaction_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub track_id: Option<String>,
    /// Redirect link returned by the gateway for pending online payments.
    pub payment_url: Option<String>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Delivery {
    pub id: i64,
    pub order_id: i64,
    pub country_name: Option<String>,
    pub governorate_name: Option<String>,
    pub area_name: Option<String>,
    pub block: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub avenue: Option<String>,
    pub directions: Option<String>,
    pub delivery_status: DeliveryStatus,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub delivery_datetime: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub received_datetime: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PointsTransaction {
    pub id: i64,
    pub customer_id: i64,
    pub order_id: Option<i64>,
    pub transaction_type: PointsTransactionType,
    pub points: i64,
    /// Wallet credit for conversions; zero for earned points.
    pub amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RefundRequest {
    pub id: i64,
    pub order_id: i64,
    pub invoice_id: i64,
    pub customer_id: Option<i64>,
    pub amount: Money,
    pub status: RefundStatus,
    pub reason: Option<String>,
    pub admin_notes: Option<String>,
    pub approved_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Line Item (draft)
// =============================================================================

/// An order line before it is persisted.
///
/// Built from requested items and mutated by the offer engine; becomes an
/// [`OrderItem`] when the order is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub variant_id: i64,
    pub product_id: i64,
    pub name: String,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub total_price: Money,
    pub is_offer: bool,
}

impl LineItem {
    /// A paid line for `variant`.
    pub fn paid(variant: &ProductVariant, quantity: i64) -> Self {
        Self::build(variant, quantity, false)
    }

    /// A reward line for `variant`, priced at the normal price.
    pub fn reward(variant: &ProductVariant, quantity: i64) -> Self {
        Self::build(variant, quantity, true)
    }

    fn build(variant: &ProductVariant, quantity: i64, is_offer: bool) -> Self {
        LineItem {
            variant_id: variant.id,
            product_id: variant.product_id,
            name: variant.product_name.clone(),
            sku: variant.sku.clone(),
            unit_price: variant.price,
            quantity,
            total_price: variant.price.multiply_quantity(quantity),
            is_offer,
        }
    }

    /// Adds `quantity` units and recomputes the line total.
    pub fn add_quantity(&mut self, quantity: i64) {
        self.quantity += quantity;
        self.total_price = self.unit_price.multiply_quantity(self.quantity);
    }
}

/// Sum of every line's total.
pub fn lines_total(lines: &[LineItem]) -> Money {
    lines.iter().map(|l| l.total_price).sum()
}
