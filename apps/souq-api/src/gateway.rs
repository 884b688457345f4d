//! HTTP client for the hosted payment page provider.
//!
//! ```text
//! POST {base_url}/payments
//! Authorization: Bearer {api_key}
//! {
//!   "order_reference": "APPS-2026-000001",
//!   "amount": "17.250",
//!   "currency": "KWD",
//!   "track_id": "…",
//!   "success_url": "…", "error_url": "…", "notify_url": "…",
//!   "customer": { "name": "…", "phone": "…" }
//! }
//!
//! 200 { "payment_url": "https://…", "payment_id": "…" }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use souq_engine::{PaymentGateway, PaymentLink, PaymentLinkRequest};

use crate::config::GatewayConfig;

#[derive(Debug, Serialize)]
struct CreatePaymentBody<'a> {
    order_reference: &'a str,
    amount: String,
    currency: &'a str,
    track_id: &'a str,
    success_url: &'a str,
    error_url: &'a str,
    notify_url: String,
    customer: CustomerBody<'a>,
}

#[derive(Debug, Serialize)]
struct CustomerBody<'a> {
    name: Option<&'a str>,
    phone: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentResponse {
    #[serde(alias = "url", alias = "link")]
    payment_url: Option<String>,
    #[serde(alias = "id", alias = "paymentid")]
    payment_id: Option<String>,
}

pub struct HttpPaymentGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(HttpPaymentGateway { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/payments", self.config.base_url.trim_end_matches('/'))
    }

    /// Webhook target: the success URL's origin plus `/payments/webhook`.
    fn notify_url(&self) -> String {
        match url::Url::parse(&self.config.success_url).and_then(|u| u.join("/payments/webhook")) {
            Ok(url) => url.to_string(),
            Err(_) => self.config.success_url.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<PaymentLink, String> {
        let body = CreatePaymentBody {
            order_reference: &request.reference,
            amount: request.amount.to_string(),
            currency: &self.config.currency,
            track_id: &request.track_id,
            success_url: &self.config.success_url,
            error_url: &self.config.error_url,
            notify_url: self.notify_url(),
            customer: CustomerBody {
                name: request.customer_name.as_deref(),
                phone: request.phone.as_deref(),
            },
        };

        let mut call = self.client.post(self.endpoint()).json(&body);
        if !self.config.api_key.is_empty() {
            call = call.bearer_auth(&self.config.api_key);
        }

        let response = call.send().await.map_err(|e| {
            warn!(reference = %request.reference, error = %e, "Gateway request failed");
            if e.is_timeout() {
                "payment gateway timed out".to_string()
            } else {
                format!("payment gateway unreachable: {e}")
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(reference = %request.reference, %status, body = %text, "Gateway rejected payment request");
            return Err(format!(
                "payment gateway returned {status}: {}",
                text.chars().take(200).collect::<String>()
            ));
        }

        let parsed: CreatePaymentResponse = response
            .json()
            .await
            .map_err(|e| format!("unreadable payment gateway response: {e}"))?;
        let url = parsed
            .payment_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| "payment gateway response has no payment url".to_string())?;

        debug!(reference = %request.reference, "Payment link created");
        Ok(PaymentLink {
            url,
            gateway_payment_id: parsed.payment_id,
        })
    }
}
