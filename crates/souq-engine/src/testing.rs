//! Shared fixtures for the engine's tests: an in-memory database, recorded
//! activity and small seeders for catalog, customers and offers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use souq_core::{
    DeliveryType, DiscountType, Money, OfferType, Order, OrderSource, OrderStatus, Payment,
    PaymentMethod, PaymentStatus, ProductVariant, Rate, RewardType,
};
use souq_db::{
    CatalogRepository, CustomerRepository, Database, DbConfig, NewAddress, NewOffer, NewOrder,
    NewPayment, OfferRepository, OrderRepository, PaymentRepository, WalletRepository,
};

use crate::activity::RecordingActivityLogger;
use crate::context::EngineContext;
use crate::gateway::{PaymentGateway, PaymentLink, PaymentLinkRequest};
use crate::numbering::{next_order_number, next_payment_number};
use crate::orchestrator::OrderDetails;
use crate::settings::StaticSettings;

pub struct Fixture {
    pub db: Database,
    pub ctx: EngineContext,
    pub activity: Arc<RecordingActivityLogger>,
}

/// 15% tax, 0.100 per point, 5% top-up bonus.
pub async fn fixture() -> Fixture {
    fixture_with_tax(1500).await
}

pub async fn fixture_with_tax(tax_bps: u32) -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let activity = Arc::new(RecordingActivityLogger::new());
    let settings = StaticSettings {
        tax_rate: Rate::from_bps(tax_bps),
        point_value: Money::from_minor(100),
        wallet_bonus_rate: Rate::from_bps(500),
    };
    let ctx = EngineContext::new(db.clone(), Arc::new(settings), activity.clone());
    Fixture { db, ctx, activity }
}

pub fn variant(id: i64, name: &str, price: i64, quantity: i64) -> ProductVariant {
    ProductVariant {
        id,
        product_id: id,
        product_name: name.to_string(),
        sku: format!("SKU-{id}"),
        price: Money::from_minor(price),
        quantity,
        is_active: true,
    }
}

pub async fn seed_variant(db: &Database, name: &str, sku: &str, price: i64, quantity: i64) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    let product = CatalogRepository::insert_product(&mut conn, name).await.unwrap();
    CatalogRepository::insert_variant(&mut conn, product, sku, Money::from_minor(price), quantity)
        .await
        .unwrap()
}

/// Customer with a starting points balance and wallet balance.
pub async fn seed_customer(db: &Database, name: &str, points: i64, wallet: i64) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    let id = CustomerRepository::insert(&mut conn, name, None).await.unwrap();
    if points > 0 {
        CustomerRepository::adjust_points(&mut conn, id, points).await.unwrap();
    }
    if wallet > 0 {
        let w = WalletRepository::get_or_create(&mut conn, id).await.unwrap();
        WalletRepository::set_balance(&mut conn, w.id, Money::from_minor(wallet))
            .await
            .unwrap();
    }
    id
}

/// Kuwait / Hawalli / Salmiya.
pub async fn seed_area(db: &Database) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    let country = CatalogRepository::insert_country(&mut conn, "Kuwait").await.unwrap();
    let governorate = CatalogRepository::insert_governorate(&mut conn, country, "Hawalli")
        .await
        .unwrap();
    CatalogRepository::insert_area(&mut conn, governorate, "Salmiya").await.unwrap()
}

pub async fn seed_address(db: &Database, customer_id: i64) -> i64 {
    let area_id = seed_area(db).await;
    let mut conn = db.pool().acquire().await.unwrap();
    CustomerRepository::insert_address(
        &mut conn,
        customer_id,
        &NewAddress {
            area_id,
            block: Some("10".into()),
            street: Some("Salem Al Mubarak".into()),
            ..NewAddress::default()
        },
    )
    .await
    .unwrap()
}

pub async fn seed_charity(db: &Database) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    CatalogRepository::insert_charity(&mut conn, "Zakat House").await.unwrap()
}

/// Pending cash pickup order with no lines, invoice or delivery.
pub async fn seed_bare_order(db: &Database, customer_id: Option<i64>) -> Order {
    let mut conn = db.pool().acquire().await.unwrap();
    let order_number = next_order_number(&mut conn, OrderSource::App, Utc::now())
        .await
        .unwrap();
    OrderRepository::insert(
        &mut conn,
        &NewOrder {
            order_number,
            source: OrderSource::App,
            customer_id,
            charity_id: None,
            delivery_type: DeliveryType::Pickup,
            payment_method: PaymentMethod::Cash,
            status: OrderStatus::Pending,
            total_amount: Money::zero(),
            notes: None,
        },
    )
    .await
    .unwrap()
}

async fn seed_offer(db: &Database, name: &str, offer_type: OfferType, reward_type: RewardType, points: i64) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    OfferRepository::insert(
        &mut conn,
        &NewOffer {
            name: name.to_string(),
            offer_type,
            reward_type,
            points,
            start_date: None,
            end_date: None,
        },
    )
    .await
    .unwrap()
}

/// "Buy `cond_qty` of `cond_variant`, get a discount."
pub async fn seed_discount_offer(
    db: &Database,
    cond_variant: i64,
    cond_qty: i64,
    discount_type: DiscountType,
    value: i64,
    points: i64,
) -> i64 {
    let offer = seed_offer(db, "Discount bundle", OfferType::Standard, RewardType::Discount, points).await;
    let mut conn = db.pool().acquire().await.unwrap();
    OfferRepository::add_condition(&mut conn, offer, cond_variant, cond_qty).await.unwrap();
    OfferRepository::add_discount_reward(&mut conn, offer, discount_type, value)
        .await
        .unwrap();
    offer
}

/// "Buy `cond_qty` of `cond_variant`, get `reward_qty` of `reward_variant` free."
pub async fn seed_product_offer(
    db: &Database,
    cond_variant: i64,
    cond_qty: i64,
    reward_variant: i64,
    reward_qty: i64,
    points: i64,
) -> i64 {
    let offer = seed_offer(db, "Free item bundle", OfferType::Standard, RewardType::Products, points).await;
    let mut conn = db.pool().acquire().await.unwrap();
    OfferRepository::add_condition(&mut conn, offer, cond_variant, cond_qty).await.unwrap();
    OfferRepository::add_product_reward(&mut conn, offer, reward_variant, reward_qty)
        .await
        .unwrap();
    offer
}

/// Charity bundle: one unit of `variant` donated per selection.
pub async fn seed_charity_offer(db: &Database, variant: i64) -> i64 {
    let offer = seed_offer(db, "Iftar basket", OfferType::Charity, RewardType::Products, 0).await;
    let mut conn = db.pool().acquire().await.unwrap();
    OfferRepository::add_product_reward(&mut conn, offer, variant, 1).await.unwrap();
    offer
}

/// Pending online payment for the full amount due, as left by a payment
/// link the customer never completed.
pub async fn seed_pending_online_payment(db: &Database, details: &OrderDetails, track_id: &str) -> Payment {
    let mut conn = db.pool().acquire().await.unwrap();
    let payment_number = next_payment_number(&mut conn, Utc::now()).await.unwrap();
    PaymentRepository::insert(
        &mut conn,
        &NewPayment {
            payment_number,
            invoice_id: Some(details.invoice.id),
            customer_id: details.order.customer_id,
            amount: details.invoice.amount_due,
            method: PaymentMethod::Online,
            status: PaymentStatus::Pending,
            track_id: Some(track_id.to_string()),
            payment_url: Some("https://pay.example.com/p/seeded".into()),
            ..NewPayment::default()
        },
    )
    .await
    .unwrap()
}

/// Pending wallet top-up awaiting its gateway callback.
pub async fn seed_wallet_charge(db: &Database, customer_id: i64, reference: &str, amount: i64) -> Payment {
    let mut conn = db.pool().acquire().await.unwrap();
    let payment_number = next_payment_number(&mut conn, Utc::now()).await.unwrap();
    PaymentRepository::insert(
        &mut conn,
        &NewPayment {
            payment_number,
            customer_id: Some(customer_id),
            reference: Some(reference.to_string()),
            amount: Money::from_minor(amount),
            method: PaymentMethod::Online,
            status: PaymentStatus::Pending,
            ..NewPayment::default()
        },
    )
    .await
    .unwrap()
}

pub async fn variant_quantity(db: &Database, variant_id: i64) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    CatalogRepository::find_variant(&mut conn, variant_id)
        .await
        .unwrap()
        .unwrap()
        .quantity
}

pub async fn customer_points(db: &Database, customer_id: i64) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    CustomerRepository::get(&mut conn, customer_id).await.unwrap().points
}

pub async fn wallet_balance(db: &Database, customer_id: i64) -> Money {
    let mut conn = db.pool().acquire().await.unwrap();
    WalletRepository::find_by_customer(&mut conn, customer_id)
        .await
        .unwrap()
        .map(|w| w.balance)
        .unwrap_or_default()
}

pub async fn count_rows(db: &Database, table: &str) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(&mut *conn)
        .await
        .unwrap()
}

/// Gateway double that answers with a fixed link or a fixed error and
/// remembers every request.
pub struct FakeGateway {
    outcome: Result<String, String>,
    requests: Mutex<Vec<PaymentLinkRequest>>,
}

impl FakeGateway {
    pub fn ok(url: &str) -> Self {
        FakeGateway {
            outcome: Ok(url.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        FakeGateway {
            outcome: Err(reason.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PaymentLinkRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<PaymentLink, String> {
        self.requests.lock().unwrap().push(request.clone());
        let url = self.outcome.clone()?;
        Ok(PaymentLink {
            url,
            gateway_payment_id: Some(format!("gw-{}", request.track_id)),
        })
    }
}
