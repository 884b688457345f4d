//! # Order Orchestrator
//!
//! Runs order creation and order update as one unit of work each.
//!
//! ## Create Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate command                                      (no tx yet)      │
//! │  BEGIN                                                                  │
//! │    load + validate offers                                               │
//! │    load variants, build lines, apply offers            (stock checked)  │
//! │    points discount (capped)  →  invoice amounts                         │
//! │    wallet? validate balance BEFORE anything is written                  │
//! │    order number → order → items (stock reserved) → offers               │
//! │    deduct points → invoice (paid if wallet) → debit wallet → delivery   │
//! │  COMMIT                                                                 │
//! │  activity                                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Update re-validates the attached offers every time, whether or not the
//! lines change.
//!
//! ## Wallet Reconciliation on Update
//! ```text
//!  previously wallet-paid │ now wallet │ action
//! ────────────────────────┼────────────┼───────────────────────────────────
//!          yes            │    yes     │ adjust(old due, new due)
//!          yes            │    no      │ credit old due, invoice → pending
//!          no             │    yes     │ validate, debit, invoice → paid
//!          no             │    no      │ nothing
//! ```

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use souq_core::inventory::{quantities_by_variant, stock_movements};
use souq_core::invoice::{apply_amounts, calculate_amounts, mark_paid, mark_unpaid, InvoiceAmounts};
use souq_core::offer::{apply_offers, referenced_variants, validate_offer};
use souq_core::points::{calculate_discount, earned_points, PointsDiscount};
use souq_core::validation::validate_note;
use souq_core::{
    lines_total, CoreError, Delivery, DeliveryType, Invoice, LineItem, Money, OfferDefinition,
    Order, OrderItem, OrderOffer, OrderStatus, PaymentMethod, PaymentStatus, ProductVariant,
    ValidationError,
};
use souq_db::{
    Conn, DeliveryRepository, NewOrder, OfferRepository, OrderRepository, PaymentRepository,
};

use crate::activity::Activity;
use crate::commands::{CreateOrderCommand, OfferSelection, OrderLineRequest, UpdateOrderCommand};
use crate::context::EngineContext;
use crate::delivery::DeliverySnapshotter;
use crate::error::FulfillmentResult;
use crate::inventory::{build_lines, with_held, InventoryLedger};
use crate::invoice::InvoiceService;
use crate::numbering::next_order_number;
use crate::points::PointsLedger;
use crate::settings::SettingsProvider;
use crate::wallet::{customer_required, record_wallet_payment, refund_payments, WalletLedger};

/// An order with everything assembled around it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub offers: Vec<OrderOffer>,
    pub invoice: Invoice,
    pub delivery: Option<Delivery>,
}

/// Lines and invoice inputs after offers and points were applied.
#[derive(Debug, Clone)]
struct PricedCart {
    lines: Vec<LineItem>,
    subtotal: Money,
    offer_discount: Money,
    points: PointsDiscount,
    amounts: InvoiceAmounts,
}

#[derive(Debug, Clone)]
pub struct OrderService {
    ctx: EngineContext,
}

impl OrderService {
    pub fn new(ctx: EngineContext) -> Self {
        OrderService { ctx }
    }

    pub async fn create_order(&self, cmd: CreateOrderCommand) -> FulfillmentResult<OrderDetails> {
        cmd.validate()?;
        let notes = validate_note("notes", cmd.notes.as_deref())?;
        let now = Utc::now();

        let mut tx = self.ctx.db.begin().await?;

        if let Some(customer_id) = cmd.customer_id {
            PointsLedger::ensure_available(&mut tx, customer_id, cmd.use_points).await?;
        }

        let offers = load_offers(&mut tx, &cmd.offers, cmd.customer_id.is_some(), now).await?;
        let requests = line_requests(&cmd.items);
        let variants = InventoryLedger::load(&mut tx, &variant_ids(&requests, &offers)).await?;
        let cart = price_cart(&requests, &offers, &variants, cmd.use_points, self.ctx.settings.as_ref())?;

        let pays_by_wallet = cmd.payment_method == PaymentMethod::Wallet;
        let wallet_customer = if pays_by_wallet {
            let customer_id = cmd.customer_id.ok_or_else(|| ValidationError::Required {
                field: "customer_id".into(),
            })?;
            WalletLedger::validate_balance(&mut tx, customer_id, cart.amounts.amount_due).await?;
            Some(customer_id)
        } else {
            None
        };

        let order_number = next_order_number(&mut tx, cmd.source, now).await?;
        let order = OrderRepository::insert(
            &mut tx,
            &NewOrder {
                order_number,
                source: cmd.source,
                customer_id: cmd.customer_id,
                charity_id: cmd.charity_id,
                delivery_type: cmd.delivery_type,
                payment_method: cmd.payment_method,
                status: OrderStatus::Pending,
                total_amount: cart.subtotal,
                notes,
            },
        )
        .await?;

        for line in &cart.lines {
            OrderRepository::insert_item(&mut tx, order.id, line).await?;
        }
        InventoryLedger::reserve_lines(&mut tx, &cart.lines).await?;
        OrderRepository::replace_offers(&mut tx, order.id, &offer_pairs(&cmd.offers)).await?;

        if let Some(customer_id) = cmd.customer_id {
            PointsLedger::deduct(&mut tx, customer_id, cart.points.used_points).await?;
        }

        let invoice = InvoiceService::create_or_get(
            &mut tx,
            &order,
            &cart.amounts,
            cart.points.used_points,
            pays_by_wallet,
            now,
        )
        .await?;

        if let Some(customer_id) = wallet_customer {
            if invoice.amount_due.is_positive() {
                WalletLedger::deduct(&mut tx, customer_id, invoice.amount_due).await?;
                record_wallet_payment(&mut tx, invoice.id, customer_id, invoice.amount_due, now).await?;
            }
        }

        let delivery = match (&cmd.delivery_type, &cmd.delivery) {
            (DeliveryType::Delivery, Some(details)) => {
                Some(DeliverySnapshotter::create(&mut tx, &order, details, now).await?)
            }
            _ => None,
        };

        let details = assemble(&mut tx, order, invoice, delivery).await?;
        tx.commit().await?;

        info!(
            order_id = details.order.id,
            order_number = %details.order.order_number,
            amount_due = %details.invoice.amount_due,
            payment_method = %details.order.payment_method,
            "Order created"
        );
        self.ctx.record(Activity::new(
            "order_created",
            "order",
            details.order.id,
            format!("Order {} created", details.order.order_number),
        ));

        Ok(details)
    }

    pub async fn update_order(
        &self,
        order_id: i64,
        cmd: UpdateOrderCommand,
    ) -> FulfillmentResult<OrderDetails> {
        cmd.validate()?;
        let now = Utc::now();

        let mut tx = self.ctx.db.begin().await?;

        let mut order = OrderRepository::find_by_id(&mut tx, order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;
        let next_status = cmd.status.unwrap_or(order.status);
        if !order.status.can_transition_to(next_status) {
            return Err(CoreError::invalid_transition("Order", order.status, next_status).into());
        }

        let payment_method = cmd.payment_method.unwrap_or(order.payment_method);
        let use_points = cmd.use_points.unwrap_or_default();
        if order.customer_id.is_none() {
            if payment_method == PaymentMethod::Wallet {
                return Err(customer_required(order.id).into());
            }
            if use_points > 0 {
                return Err(ValidationError::Conflict(
                    "points can only be redeemed on customer orders".into(),
                )
                .into());
            }
        }

        let mut invoice = InvoiceService::for_order(&mut tx, order.id).await?;
        let previous_due = invoice.amount_due;
        let was_wallet_paid = order.payment_method == PaymentMethod::Wallet && invoice.is_paid();
        let requested_points = cmd.use_points.unwrap_or(invoice.used_points);

        if let Some(customer_id) = order.customer_id {
            PointsLedger::refund(&mut tx, customer_id, invoice.used_points).await?;
            PointsLedger::ensure_available(&mut tx, customer_id, requested_points).await?;
        }

        let (subtotal, offer_discount) = match &cmd.items {
            Some(items) => {
                let selections = match &cmd.offers {
                    Some(offers) => offers.clone(),
                    None => stored_selections(&mut tx, order.id).await?,
                };
                self.replace_lines(&mut tx, &order, items, &selections, now).await?
            }
            None => {
                // unchanged lines still need their offers to hold
                let selections = stored_selections(&mut tx, order.id).await?;
                load_offers(&mut tx, &selections, order.customer_id.is_some(), now).await?;
                (order.total_amount, invoice.offer_discount)
            }
        };

        let points = calculate_discount(
            requested_points,
            self.ctx.settings.point_value(),
            subtotal,
            offer_discount,
        );
        if let Some(customer_id) = order.customer_id {
            PointsLedger::deduct(&mut tx, customer_id, points.used_points).await?;
        }
        let amounts = calculate_amounts(subtotal, offer_discount, points.discount, self.ctx.settings.tax_rate());
        apply_amounts(&mut invoice, &amounts, points.used_points);
        invoice.updated_at = now;

        self.reconcile_wallet(&mut tx, &order, &mut invoice, payment_method, was_wallet_paid, previous_due, now)
            .await?;

        let completing = next_status == OrderStatus::Completed && order.status != OrderStatus::Completed;
        order.status = next_status;
        order.payment_method = payment_method;
        order.delivery_type = cmd.delivery_type.unwrap_or(order.delivery_type);
        order.total_amount = subtotal;
        if cmd.notes.is_some() {
            order.notes = validate_note("notes", cmd.notes.as_deref())?;
        }
        order.updated_at = now;

        let mut earned = 0;
        if completing && !order.points_awarded {
            earned = award_points(&mut tx, &order).await?;
            order.points_awarded = true;
        }

        InvoiceService::save(&mut tx, &invoice).await?;
        OrderRepository::update(&mut tx, &order).await?;
        let delivery = DeliverySnapshotter::sync(&mut tx, &order, cmd.delivery.as_ref(), now).await?;

        let details = assemble(&mut tx, order, invoice, delivery).await?;
        tx.commit().await?;

        info!(
            order_id = details.order.id,
            status = %details.order.status,
            amount_due = %details.invoice.amount_due,
            "Order updated"
        );
        self.ctx.record(Activity::new(
            "order_updated",
            "order",
            details.order.id,
            format!("Order {} updated", details.order.order_number),
        ));
        if earned > 0 {
            self.ctx.record(Activity::new(
                "points_earned",
                "order",
                details.order.id,
                format!("{earned} points earned on order {}", details.order.order_number),
            ));
        }

        Ok(details)
    }

    pub async fn get_order(&self, order_id: i64) -> FulfillmentResult<OrderDetails> {
        let mut conn = self.ctx.db.pool().acquire().await?;
        let order = OrderRepository::find_by_id(&mut conn, order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;
        let invoice = InvoiceService::for_order(&mut conn, order.id).await?;
        let delivery = DeliveryRepository::find_by_order(&mut conn, order.id).await?;
        assemble(&mut conn, order, invoice, delivery).await
    }

    /// Re-prices the order from new lines, moves only the net stock
    /// difference and rewrites the stored lines and offers.
    async fn replace_lines(
        &self,
        conn: &mut Conn,
        order: &Order,
        items: &[OrderLineRequest],
        selections: &[OfferSelection],
        now: DateTime<Utc>,
    ) -> FulfillmentResult<(Money, Money)> {
        let offers = load_offers(conn, selections, order.customer_id.is_some(), now).await?;
        let old_items = OrderRepository::items(conn, order.id).await?;
        let held: BTreeMap<i64, i64> =
            quantities_by_variant(old_items.iter().map(|i| (i.variant_id, i.quantity)));

        let requests = line_requests(items);
        let variants = InventoryLedger::load(conn, &variant_ids(&requests, &offers)).await?;
        let effective = with_held(variants, &held);
        let cart = price_cart(&requests, &offers, &effective, 0, self.ctx.settings.as_ref())?;

        let movements = stock_movements(
            old_items.iter().map(|i| (i.variant_id, i.quantity)),
            cart.lines.iter().map(|l| (l.variant_id, l.quantity)),
        );
        debug!(order_id = order.id, movements = movements.len(), "Reconciling stock");
        InventoryLedger::apply(conn, &movements).await?;

        OrderRepository::delete_items(conn, order.id).await?;
        for line in &cart.lines {
            OrderRepository::insert_item(conn, order.id, line).await?;
        }
        OrderRepository::replace_offers(conn, order.id, &offer_pairs(selections)).await?;

        Ok((cart.subtotal, cart.offer_discount))
    }

    #[allow(clippy::too_many_arguments)]
    async fn reconcile_wallet(
        &self,
        conn: &mut Conn,
        order: &Order,
        invoice: &mut Invoice,
        payment_method: PaymentMethod,
        was_wallet_paid: bool,
        previous_due: Money,
        now: DateTime<Utc>,
    ) -> FulfillmentResult<()> {
        let pays_by_wallet = payment_method == PaymentMethod::Wallet;
        if !was_wallet_paid && !pays_by_wallet {
            return Ok(());
        }
        let customer_id = order.customer_id.ok_or_else(|| customer_required(order.id))?;

        match (was_wallet_paid, pays_by_wallet) {
            (true, true) => {
                WalletLedger::adjust(conn, customer_id, previous_due, invoice.amount_due).await?;
                let existing = PaymentRepository::find_latest(
                    conn,
                    invoice.id,
                    PaymentMethod::Wallet,
                    PaymentStatus::Completed,
                )
                .await?;
                match existing {
                    Some(mut payment) => {
                        payment.amount = invoice.amount_due;
                        PaymentRepository::update(conn, &payment).await?;
                    }
                    None if invoice.amount_due.is_positive() => {
                        record_wallet_payment(conn, invoice.id, customer_id, invoice.amount_due, now).await?;
                    }
                    None => {}
                }
            }
            (true, false) => {
                WalletLedger::credit(conn, customer_id, previous_due).await?;
                mark_unpaid(invoice, now)?;
                refund_payments(conn, invoice.id, PaymentMethod::Wallet).await?;
                info!(order_id = order.id, refunded = %previous_due, "Wallet charge returned");
            }
            (false, true) => {
                if invoice.is_paid() {
                    return Err(ValidationError::Conflict(format!(
                        "order {} is already paid by {}",
                        order.id, order.payment_method
                    ))
                    .into());
                }
                WalletLedger::validate_balance(conn, customer_id, invoice.amount_due).await?;
                WalletLedger::deduct(conn, customer_id, invoice.amount_due).await?;
                mark_paid(invoice, now)?;
                if invoice.amount_due.is_positive() {
                    record_wallet_payment(conn, invoice.id, customer_id, invoice.amount_due, now).await?;
                }
            }
            (false, false) => {}
        }
        Ok(())
    }
}

async fn load_offers(
    conn: &mut Conn,
    selections: &[OfferSelection],
    has_customer: bool,
    now: DateTime<Utc>,
) -> FulfillmentResult<Vec<(OfferDefinition, i64)>> {
    let mut offers = Vec::with_capacity(selections.len());
    for selection in selections {
        let definition = OfferRepository::find_definition(conn, selection.offer_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Offer", selection.offer_id))?;
        validate_offer(&definition.offer, has_customer, now)?;
        offers.push((definition, selection.quantity));
    }
    Ok(offers)
}

async fn stored_selections(conn: &mut Conn, order_id: i64) -> FulfillmentResult<Vec<OfferSelection>> {
    let stored = OrderRepository::offers(conn, order_id).await?;
    Ok(stored
        .into_iter()
        .map(|o| OfferSelection {
            offer_id: o.offer_id,
            quantity: o.quantity,
        })
        .collect())
}

/// Credits `offer.points × quantity` over the attached offers.
async fn award_points(conn: &mut Conn, order: &Order) -> FulfillmentResult<i64> {
    let Some(customer_id) = order.customer_id else {
        return Ok(0);
    };

    let mut grants = Vec::new();
    for attached in OrderRepository::offers(conn, order.id).await? {
        if let Some(offer) = OfferRepository::find_by_id(conn, attached.offer_id).await? {
            grants.push((offer.points, attached.quantity));
        }
    }

    let points = earned_points(grants);
    PointsLedger::record_earned(conn, customer_id, order.id, points).await?;
    Ok(points)
}

async fn assemble(
    conn: &mut Conn,
    order: Order,
    invoice: Invoice,
    delivery: Option<Delivery>,
) -> FulfillmentResult<OrderDetails> {
    let items = OrderRepository::items(conn, order.id).await?;
    let offers = OrderRepository::offers(conn, order.id).await?;
    Ok(OrderDetails {
        order,
        items,
        offers,
        invoice,
        delivery,
    })
}

fn line_requests(items: &[OrderLineRequest]) -> Vec<(i64, i64)> {
    items.iter().map(|i| (i.variant_id, i.quantity)).collect()
}

fn offer_pairs(selections: &[OfferSelection]) -> Vec<(i64, i64)> {
    selections.iter().map(|s| (s.offer_id, s.quantity)).collect()
}

fn variant_ids(requests: &[(i64, i64)], offers: &[(OfferDefinition, i64)]) -> Vec<i64> {
    let mut ids: Vec<i64> = requests
        .iter()
        .map(|(variant_id, _)| *variant_id)
        .chain(offers.iter().flat_map(|(definition, _)| referenced_variants(definition)))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn price_cart(
    requests: &[(i64, i64)],
    offers: &[(OfferDefinition, i64)],
    variants: &HashMap<i64, ProductVariant>,
    use_points: i64,
    settings: &dyn SettingsProvider,
) -> Result<PricedCart, CoreError> {
    let mut lines = build_lines(requests.iter().copied(), variants)?;
    let selections: Vec<(&OfferDefinition, i64)> = offers.iter().map(|(d, q)| (d, *q)).collect();
    let subtotal = lines_total(&lines);
    let outcome = apply_offers(&selections, variants, &mut lines, subtotal)?;

    let points = calculate_discount(use_points, settings.point_value(), outcome.subtotal, outcome.discount);
    let amounts = calculate_amounts(outcome.subtotal, outcome.discount, points.discount, settings.tax_rate());

    Ok(PricedCart {
        lines,
        subtotal: outcome.subtotal,
        offer_discount: outcome.discount,
        points,
        amounts,
    })
}
