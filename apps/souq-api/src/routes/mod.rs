//! # Routes
//!
//! ```text
//! GET  /health
//! POST /orders                         GET|PUT /orders/{id}
//! POST /orders/{id}/cancel             POST /orders/{id}/payment-link
//! GET  /orders/{id}/refund-requests
//! GET  /payments/success               GET  /payments/cancel
//! POST /payments/webhook
//! POST /refund-requests/{id}/approve   POST /refund-requests/{id}/reject
//! GET  /customers/{id}/wallet          POST /customers/{id}/wallet/charge
//! POST /customers/{id}/points/convert
//! ```

use axum::Router;
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub mod customers;
pub mod health;
pub mod orders;
pub mod payments;
pub mod refunds;

/// Every route, without state or middleware.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(refunds::router())
        .merge(customers::router())
}

/// The served application.
pub fn build_app(state: AppState) -> Router {
    build_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON body that may be omitted entirely.
pub(crate) fn optional_body<T>(body: &[u8]) -> ApiResult<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
}
