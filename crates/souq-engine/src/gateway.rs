//! # Payment Initiation
//!
//! Creates gateway payment links for order invoices and wallet top-ups.
//!
//! The gateway is a network call, so it never runs while a transaction is
//! open:
//! ```text
//! read order / invoice ──▶ gateway.create_payment_link ──▶ tx: upsert pending payment
//!
//! wallet top-up:
//! tx: reserve WCH reference + pending payment ──▶ gateway ──▶ store link
//!                                                    │ error
//!                                                    └──▶ payment failed
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use souq_core::invoice::shortfall;
use souq_core::validation::validate_positive_amount;
use souq_core::{
    CoreError, Customer, Money, OrderStatus, Payment, PaymentMethod, PaymentStatus,
};
use souq_db::{
    CustomerRepository, InvoiceRepository, NewPayment, OrderRepository, PaymentRepository,
};

use crate::activity::Activity;
use crate::context::EngineContext;
use crate::error::FulfillmentResult;
use crate::invoice::InvoiceService;
use crate::numbering::{next_payment_number, next_wallet_charge_reference};
use crate::points::PointsLedger;

/// What the gateway needs to open a hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLinkRequest {
    /// Order number or `WCH-…` reference, echoed back in callbacks.
    pub reference: String,
    pub amount: Money,
    pub track_id: String,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub url: String,
    pub gateway_payment_id: Option<String>,
}

/// Hosted payment-page provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<PaymentLink, String>;
}

/// A pending online payment and where to send the customer.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentInitiation {
    pub payment: Payment,
    pub payment_url: String,
}

#[derive(Clone)]
pub struct PaymentService {
    ctx: EngineContext,
    gateway: Arc<dyn PaymentGateway>,
}

impl std::fmt::Debug for PaymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentService").field("ctx", &self.ctx).finish_non_exhaustive()
    }
}

impl PaymentService {
    pub fn new(ctx: EngineContext, gateway: Arc<dyn PaymentGateway>) -> Self {
        PaymentService { ctx, gateway }
    }

    /// Opens a payment link for the outstanding balance of an order.
    ///
    /// Reuses the latest pending online payment of the invoice when there is
    /// one, so repeated clicks on "pay" never pile up rows.
    pub async fn initiate_online_payment(&self, order_id: i64) -> FulfillmentResult<PaymentInitiation> {
        let (request, invoice_id, customer_id) = {
            let mut conn = self.ctx.db.pool().acquire().await?;
            let order = OrderRepository::find_by_id(&mut conn, order_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Order", order_id))?;
            if order.status == OrderStatus::Cancelled {
                return Err(CoreError::already_processed("Order", order_id, order.status).into());
            }
            let invoice = InvoiceService::for_order(&mut conn, order_id).await?;
            if invoice.is_paid() {
                return Err(CoreError::already_processed("Invoice", invoice.id, invoice.status).into());
            }
            let paid = PaymentRepository::sum_completed(&mut conn, invoice.id).await?;
            let amount = shortfall(invoice.amount_due, paid);
            if !amount.is_positive() {
                return Err(CoreError::already_processed("Invoice", invoice.id, "settled").into());
            }
            let customer = match order.customer_id {
                Some(id) => CustomerRepository::find_by_id(&mut conn, id).await?,
                None => None,
            };
            (
                link_request(order.order_number, amount, customer.as_ref()),
                invoice.id,
                order.customer_id,
            )
        };

        let link = self.create_link(&request).await?;

        let now = Utc::now();
        let mut tx = self.ctx.db.begin().await?;

        let invoice = InvoiceRepository::find_by_id(&mut tx, invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", invoice_id))?;
        if invoice.is_paid() {
            return Err(CoreError::already_processed("Invoice", invoice.id, invoice.status).into());
        }

        let payment = match PaymentRepository::find_latest_pending(&mut tx, invoice_id, PaymentMethod::Online).await? {
            Some(mut payment) => {
                payment.amount = request.amount;
                payment.track_id = Some(request.track_id.clone());
                payment.payment_url = Some(link.url.clone());
                payment.gateway_payment_id = link.gateway_payment_id.clone();
                payment.updated_at = now;
                PaymentRepository::update(&mut tx, &payment).await?;
                payment
            }
            None => {
                let payment_number = next_payment_number(&mut tx, now).await?;
                PaymentRepository::insert(
                    &mut tx,
                    &NewPayment {
                        payment_number,
                        invoice_id: Some(invoice_id),
                        customer_id,
                        amount: request.amount,
                        method: PaymentMethod::Online,
                        status: PaymentStatus::Pending,
                        gateway_payment_id: link.gateway_payment_id.clone(),
                        track_id: Some(request.track_id.clone()),
                        payment_url: Some(link.url.clone()),
                        ..NewPayment::default()
                    },
                )
                .await?
            }
        };

        tx.commit().await?;

        info!(order_id, payment_id = payment.id, amount = %payment.amount, "Online payment initiated");
        self.ctx.record(Activity::new(
            "payment_initiated",
            "payment",
            payment.id,
            format!("{} for {}", payment.payment_number, request.reference),
        ));

        Ok(PaymentInitiation {
            payment,
            payment_url: link.url,
        })
    }

    /// Opens a payment link that tops up a customer's wallet.
    ///
    /// The `WCH-…` reference and its pending payment are committed before
    /// the gateway is called; a gateway failure marks that payment failed.
    pub async fn initiate_wallet_charge(
        &self,
        customer_id: i64,
        amount: Money,
    ) -> FulfillmentResult<PaymentInitiation> {
        validate_positive_amount("amount", amount)?;

        let now = Utc::now();
        let mut tx = self.ctx.db.begin().await?;
        let customer = PointsLedger::customer(&mut tx, customer_id).await?;
        let reference = next_wallet_charge_reference(&mut tx, now).await?;
        let request = link_request(reference, amount, Some(&customer));
        let payment_number = next_payment_number(&mut tx, now).await?;
        let mut payment = PaymentRepository::insert(
            &mut tx,
            &NewPayment {
                payment_number,
                customer_id: Some(customer_id),
                reference: Some(request.reference.clone()),
                amount,
                method: PaymentMethod::Online,
                status: PaymentStatus::Pending,
                track_id: Some(request.track_id.clone()),
                ..NewPayment::default()
            },
        )
        .await?;
        tx.commit().await?;

        let link = match self.create_link(&request).await {
            Ok(link) => link,
            Err(e) => {
                let mut conn = self.ctx.db.pool().acquire().await?;
                payment.status = PaymentStatus::Failed;
                payment.updated_at = Utc::now();
                PaymentRepository::update(&mut conn, &payment).await?;
                return Err(e);
            }
        };

        payment.payment_url = Some(link.url.clone());
        payment.gateway_payment_id = link.gateway_payment_id;
        payment.updated_at = Utc::now();
        let mut conn = self.ctx.db.pool().acquire().await?;
        PaymentRepository::update(&mut conn, &payment).await?;
        drop(conn);

        info!(customer_id, reference = %request.reference, amount = %amount, "Wallet charge initiated");
        self.ctx.record(Activity::new(
            "wallet_charge_initiated",
            "customer",
            customer_id,
            format!("{} for {amount}", request.reference),
        ));

        Ok(PaymentInitiation {
            payment,
            payment_url: link.url,
        })
    }

    async fn create_link(&self, request: &PaymentLinkRequest) -> FulfillmentResult<PaymentLink> {
        let link = self.gateway.create_payment_link(request).await.map_err(|reason| {
            warn!(reference = %request.reference, %reason, "Gateway rejected payment link request");
            CoreError::ExternalGateway(reason)
        })?;
        usable_link(&link)?;
        Ok(link)
    }
}

fn link_request(reference: String, amount: Money, customer: Option<&Customer>) -> PaymentLinkRequest {
    PaymentLinkRequest {
        reference,
        amount,
        track_id: uuid::Uuid::new_v4().to_string(),
        customer_name: customer.map(|c| c.name.clone()),
        phone: customer.and_then(|c| c.phone.clone()),
    }
}

/// Gateways occasionally answer 200 with an empty or relative URL.
fn usable_link(link: &PaymentLink) -> Result<(), CoreError> {
    match url::Url::parse(&link.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(CoreError::ExternalGateway(format!(
            "gateway returned an unusable payment url: {:?}",
            link.url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CreateOrderCommand, OrderLineRequest};
    use crate::orchestrator::OrderService;
    use crate::reconciliation::{ReconciliationOutcome, ReconciliationService};
    use crate::testing::{self, FakeGateway};
    use souq_core::gateway::GatewayCallbackPayload;
    use souq_core::{DeliveryType, OrderSource};

    #[test]
    fn test_usable_link() {
        let ok = PaymentLink {
            url: "https://pay.example.com/p/123".into(),
            gateway_payment_id: None,
        };
        assert!(usable_link(&ok).is_ok());
        for url in ["", "/relative", "javascript:alert(1)"] {
            let bad = PaymentLink {
                url: url.into(),
                gateway_payment_id: None,
            };
            assert!(usable_link(&bad).is_err(), "{url}");
        }
    }

    #[tokio::test]
    async fn test_repeated_initiation_reuses_pending_payment() {
        let fx = testing::fixture().await;
        let variant = testing::seed_variant(&fx.db, "Gift Box", "GIFT-1", 15_000, 10).await;
        let customer = testing::seed_customer(&fx.db, "Mona", 0, 0).await;
        let details = OrderService::new(fx.ctx.clone())
            .create_order(CreateOrderCommand {
                source: OrderSource::App,
                customer_id: Some(customer),
                charity_id: None,
                items: vec![OrderLineRequest { variant_id: variant, quantity: 1 }],
                offers: Vec::new(),
                use_points: 0,
                payment_method: PaymentMethod::Online,
                delivery_type: DeliveryType::Pickup,
                delivery: None,
                notes: None,
            })
            .await
            .unwrap();

        let gateway = Arc::new(FakeGateway::ok("https://pay.example.com/p/1"));
        let service = PaymentService::new(fx.ctx.clone(), gateway.clone());

        let first = service.initiate_online_payment(details.order.id).await.unwrap();
        let second = service.initiate_online_payment(details.order.id).await.unwrap();
        assert_eq!(first.payment.id, second.payment.id);
        assert_eq!(second.payment.amount, Money::from_minor(17_250));
        assert_eq!(second.payment_url, "https://pay.example.com/p/1");
        assert_ne!(first.payment.track_id, second.payment.track_id);
        assert_eq!(testing::count_rows(&fx.db, "payments").await, 1);

        let requests = gateway.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].reference, details.order.order_number);
        assert_eq!(requests[0].customer_name.as_deref(), Some("Mona"));

        // the webhook settles the very row that was initiated
        let outcome = ReconciliationService::new(fx.ctx.clone())
            .handle_webhook(&GatewayCallbackPayload::from_fields([
                ("order_number", details.order.order_number.as_str()),
                ("result", "CAPTURED"),
                ("trackid", "ignored"),
            ]))
            .await
            .unwrap();
        let ReconciliationOutcome::Applied { payment, invoice } = outcome else {
            panic!("capture not applied");
        };
        assert_eq!(payment.id, first.payment.id);
        assert!(invoice.unwrap().is_paid());

        let err = service.initiate_online_payment(details.order.id).await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_PROCESSED");
    }

    #[tokio::test]
    async fn test_wallet_charge_failure_marks_payment_failed() {
        let fx = testing::fixture().await;
        let customer = testing::seed_customer(&fx.db, "Jassim", 0, 0).await;

        let failing = PaymentService::new(fx.ctx.clone(), Arc::new(FakeGateway::failing("timeout")));
        let err = failing
            .initiate_wallet_charge(customer, Money::from_minor(5_000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "EXTERNAL_GATEWAY_ERROR");

        let mut conn = fx.db.pool().acquire().await.unwrap();
        let failed = PaymentRepository::find_by_reference(&mut conn, &format!("WCH-{}-000001", Utc::now().format("%Y")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);
        drop(conn);

        let working = PaymentService::new(fx.ctx.clone(), Arc::new(FakeGateway::ok("https://pay.example.com/w")));
        let charge = working
            .initiate_wallet_charge(customer, Money::from_minor(5_000))
            .await
            .unwrap();
        assert!(charge.payment.reference.as_deref().unwrap().ends_with("-000002"));
        assert_eq!(charge.payment.status, PaymentStatus::Pending);
        assert!(charge.payment.invoice_id.is_none());

        let err = working.initiate_wallet_charge(customer, Money::zero()).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
