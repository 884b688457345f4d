use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use souq_core::Money;
use souq_engine::{PaymentInitiation, PointsConversion};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers/{id}/wallet", get(wallet_balance))
        .route("/customers/{id}/wallet/charge", post(charge_wallet))
        .route("/customers/{id}/points/convert", post(convert_points))
}

/// `amount` is a decimal string such as `"5.000"`.
#[derive(Debug, Deserialize)]
pub struct ChargeBody {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct ConvertBody {
    pub points: i64,
}

#[derive(Debug, Serialize)]
pub struct WalletBalance {
    pub customer_id: i64,
    pub balance: Money,
}

async fn wallet_balance(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<WalletBalance>> {
    let balance = state.engine.wallet.balance(id).await?;
    Ok(Json(WalletBalance {
        customer_id: id,
        balance,
    }))
}

async fn charge_wallet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ChargeBody>,
) -> ApiResult<Json<PaymentInitiation>> {
    let amount: Money = body
        .amount
        .parse()
        .map_err(|e: souq_core::money::ParseMoneyError| ApiError::bad_request(e.to_string()))?;
    Ok(Json(state.engine.payments.initiate_wallet_charge(id, amount).await?))
}

async fn convert_points(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ConvertBody>,
) -> ApiResult<Json<PointsConversion>> {
    Ok(Json(
        state
            .engine
            .wallet
            .convert_points_to_wallet(id, body.points)
            .await?,
    ))
}
