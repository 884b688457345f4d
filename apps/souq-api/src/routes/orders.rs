use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use souq_core::RefundRequest;
use souq_engine::{
    CancellationOutcome, CreateOrderCommand, OrderDetails, PaymentInitiation, UpdateOrderCommand,
};

use crate::error::ApiResult;
use crate::routes::optional_body;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", get(get_order).put(update_order))
        .route("/orders/{id}/cancel", post(cancel_order))
        .route("/orders/{id}/payment-link", post(payment_link))
        .route("/orders/{id}/refund-requests", get(refund_requests))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CancelBody {
    pub reason: Option<String>,
}

async fn create_order(
    State(state): State<AppState>,
    Json(cmd): Json<CreateOrderCommand>,
) -> ApiResult<(StatusCode, Json<OrderDetails>)> {
    let details = state.engine.orders.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

async fn get_order(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<OrderDetails>> {
    Ok(Json(state.engine.orders.get_order(id).await?))
}

async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(cmd): Json<UpdateOrderCommand>,
) -> ApiResult<Json<OrderDetails>> {
    Ok(Json(state.engine.orders.update_order(id, cmd).await?))
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<CancellationOutcome>> {
    let reason = optional_body::<CancelBody>(&body)?.reason;
    Ok(Json(state.engine.cancellations.cancel_order(id, reason).await?))
}

async fn payment_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PaymentInitiation>> {
    Ok(Json(state.engine.payments.initiate_online_payment(id).await?))
}

async fn refund_requests(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<RefundRequest>>> {
    Ok(Json(state.engine.cancellations.refunds_for_order(id).await?))
}
