//! Gateway redirects and notifications.
//!
//! The gateway is not a client we can fix: redirect query strings may arrive
//! HTML-escaped and notifications come as JSON or as a form body, so every
//! handler reads the raw input and lets [`GatewayCallbackPayload`] sort it out.

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, warn};

use souq_core::gateway::GatewayCallbackPayload;
use souq_engine::{FulfillmentResult, ReconciliationOutcome};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments/success", get(success))
        .route("/payments/cancel", get(cancel))
        .route("/payments/webhook", post(webhook))
}

async fn success(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Response> {
    let payload = GatewayCallbackPayload::from_query(query.as_deref().unwrap_or_default());
    let result = state.engine.reconciliation.handle_success(&payload).await;
    settle_response(&payload, "success", result)
}

async fn cancel(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Response> {
    let payload = GatewayCallbackPayload::from_query(query.as_deref().unwrap_or_default());
    let outcome = state.engine.reconciliation.handle_cancel(&payload).await?;
    Ok(outcome_response(outcome))
}

async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Response> {
    let payload = parse_webhook(&headers, &body)?;
    let result = state.engine.reconciliation.handle_webhook(&payload).await;
    settle_response(&payload, "webhook", result)
}

/// Once the gateway reports a capture the money is taken: a failure to
/// record it is logged and acknowledged, and the next redirect or replay
/// settles it.
fn settle_response(
    payload: &GatewayCallbackPayload,
    channel: &'static str,
    result: FulfillmentResult<ReconciliationOutcome>,
) -> ApiResult<Response> {
    match result {
        Ok(outcome) => Ok(outcome_response(outcome)),
        Err(err) if payload.is_captured() && !err.is_not_found() => {
            error!(
                channel,
                reference = payload.order_reference.as_deref().unwrap_or("-"),
                code = err.code(),
                error = %err,
                "Captured payment could not be reconciled"
            );
            Ok((StatusCode::OK, Json(json!({ "status": "accepted" }))).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_webhook(headers: &HeaderMap, body: &[u8]) -> ApiResult<GatewayCallbackPayload> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));

    if is_json {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?;
        Ok(GatewayCallbackPayload::from_json(&value))
    } else {
        Ok(GatewayCallbackPayload::from_query(&String::from_utf8_lossy(body)))
    }
}

fn outcome_response(outcome: ReconciliationOutcome) -> Response {
    if let ReconciliationOutcome::Unresolved { reference } = &outcome {
        warn!(reference = reference.as_deref().unwrap_or("-"), "Callback for unknown order");
        let message = match reference {
            Some(r) => format!("no order or invoice matches reference '{r}'"),
            None => "callback carries no order reference".to_string(),
        };
        return ApiError::not_found(message).into_response();
    }
    (StatusCode::OK, Json(outcome)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_webhook_by_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let payload = parse_webhook(
            &headers,
            br#"{"order_reference": "APPS-2026-000001", "result": "CAPTURED", "amount": "17.250"}"#,
        )
        .unwrap();
        assert_eq!(payload.order_reference.as_deref(), Some("APPS-2026-000001"));
        assert!(payload.is_captured());

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let payload = parse_webhook(&headers, b"order_reference=APPS-2026-000001&result=NOT+CAPTURED").unwrap();
        assert!(!payload.is_captured());

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let err = parse_webhook(&headers, b"{not json").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
