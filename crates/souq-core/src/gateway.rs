//! # Gateway Callback Normalization
//!
//! Payment gateways report results through redirects (query strings) and
//! webhooks (JSON or form bodies), under a variety of key names. This module
//! turns all of them into one typed [`GatewayCallbackPayload`].
//!
//! ## Recovery of Malformed Redirects
//! ```text
//! ?order_number=APPS-2026-000001?result=CAPTURED&amp;amount=17.250
//!              │                │        │
//!              │                │        └── HTML-escaped separator
//!              │                └── second '?' used as separator
//!              ▼
//! order_number=APPS-2026-000001&result=CAPTURED&amount=17.250
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::money::Money;
use crate::types::PaymentStatus;

const ORDER_KEYS: &[&str] = &[
    "order_number",
    "order_no",
    "order_reference",
    "requested_order_id",
    "order_id",
    "orderid",
    "reference",
];
const RESULT_KEYS: &[&str] = &["result", "status", "payment_status", "result_code"];
const AMOUNT_KEYS: &[&str] = &["amount", "amt", "paid_amount", "total"];
const PAYMENT_ID_KEYS: &[&str] = &["payment_id", "paymentid", "payid"];
const TRANSACTION_KEYS: &[&str] = &["transaction_id", "tran_id", "tranid", "transid"];
const RECEIPT_KEYS: &[&str] = &["receipt_id", "receiptid", "receipt", "ref"];
const TRACK_KEYS: &[&str] = &["track_id", "trackid"];

/// Normalized gateway callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCallbackPayload {
    pub order_reference: Option<String>,
    pub result: Option<String>,
    pub amount: Option<Money>,
    pub payment_id: Option<String>,
    pub transaction_id: Option<String>,
    pub receipt_id: Option<String>,
    pub track_id: Option<String>,
}

impl GatewayCallbackPayload {
    /// Builds a payload from key/value pairs. Keys match case-insensitively;
    /// the first non-empty value for the highest-priority alias wins.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let fields: Vec<(String, String)> = fields
            .into_iter()
            .map(|(k, v)| {
                (
                    k.as_ref().trim().to_ascii_lowercase(),
                    v.as_ref().trim().to_string(),
                )
            })
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let pick = |aliases: &[&str]| -> Option<String> {
            aliases.iter().find_map(|alias| {
                fields
                    .iter()
                    .find(|(k, _)| k == alias)
                    .map(|(_, v)| v.clone())
            })
        };

        GatewayCallbackPayload {
            order_reference: pick(ORDER_KEYS),
            result: pick(RESULT_KEYS),
            amount: pick(AMOUNT_KEYS)
                .and_then(|a| a.parse::<Money>().ok())
                .filter(|a| a.is_positive()),
            payment_id: pick(PAYMENT_ID_KEYS),
            transaction_id: pick(TRANSACTION_KEYS),
            receipt_id: pick(RECEIPT_KEYS),
            track_id: pick(TRACK_KEYS),
        }
    }

    /// Parses a raw redirect query string, repairing it first.
    pub fn from_query(raw: &str) -> Self {
        let repaired = repair_query(raw);
        Self::from_fields(url::form_urlencoded::parse(repaired.as_bytes()))
    }

    /// Parses a JSON webhook body. Nested objects are flattened and scalar
    /// values stringified, so `{"data": {"amount": 17.25}}` yields an amount.
    pub fn from_json(value: &Value) -> Self {
        let mut fields = Vec::new();
        flatten(value, &mut fields);
        Self::from_fields(fields)
    }

    /// Internal payment status for the reported result.
    pub fn status(&self) -> PaymentStatus {
        map_gateway_status(self.result.as_deref())
    }

    pub fn is_captured(&self) -> bool {
        self.status() == PaymentStatus::Completed
    }

    /// Receipt stored on the payment row: receipt, then transaction, then
    /// the gateway's payment id.
    pub fn receipt_key(&self) -> Option<&str> {
        self.gateway_ids().into_iter().next()
    }

    /// Every gateway identifier the callback carries, in receipt key order.
    /// A stored payment matching any of them is the same capture.
    pub fn gateway_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::with_capacity(3);
        for id in [&self.receipt_id, &self.transaction_id, &self.payment_id]
            .into_iter()
            .flatten()
        {
            if !ids.contains(&id.as_str()) {
                ids.push(id);
            }
        }
        ids
    }
}

/// Maps the gateway's free-text result to [`PaymentStatus`].
///
/// Unknown or missing results stay `Pending`.
pub fn map_gateway_status(result: Option<&str>) -> PaymentStatus {
    let Some(result) = result else {
        return PaymentStatus::Pending;
    };

    match result.trim().to_ascii_lowercase().as_str() {
        "captured" | "success" | "successful" | "paid" | "completed" | "approved" => {
            PaymentStatus::Completed
        }
        "failed" | "failure" | "rejected" | "declined" | "cancelled" | "canceled"
        | "not captured" | "error" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

/// Repairs a redirect query string before form-decoding.
pub fn repair_query(raw: &str) -> String {
    let trimmed = raw.trim();
    let query = match trimmed.find('?') {
        // a full URL, or a leading '?'
        Some(idx) if !trimmed[..idx].contains('=') => &trimmed[idx + 1..],
        _ => trimmed,
    };

    query
        .replace("&amp;", "&")
        .replace("&#38;", "&")
        .replace('?', "&")
}

fn flatten(value: &Value, out: &mut Vec<(String, String)>) {
    if let Value::Object(map) = value {
        for (key, value) in map {
            match value {
                Value::Object(_) => flatten(value, out),
                Value::String(s) => out.push((key.clone(), s.clone())),
                Value::Number(n) => out.push((key.clone(), n.to_string())),
                Value::Bool(b) => out.push((key.clone(), b.to_string())),
                Value::Null | Value::Array(_) => {}
            }
        }
    }
}
