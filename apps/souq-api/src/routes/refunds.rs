use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use souq_engine::RefundDecision;

use crate::error::{ApiError, ApiResult};
use crate::routes::optional_body;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/refund-requests/{id}/approve", post(approve))
        .route("/refund-requests/{id}/reject", post(reject))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DecisionBody {
    /// Staff member taking the decision.
    pub admin: Option<String>,
    pub notes: Option<String>,
}

impl DecisionBody {
    fn admin(&self) -> ApiResult<&str> {
        match self.admin.as_deref().map(str::trim) {
            Some(admin) if !admin.is_empty() => Ok(admin),
            _ => Err(ApiError::bad_request("admin is required")),
        }
    }
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<RefundDecision>> {
    let body: DecisionBody = optional_body(&body)?;
    let admin = body.admin()?;
    let decision = state
        .engine
        .cancellations
        .approve_refund(id, admin, body.notes.clone())
        .await?;
    Ok(Json(decision))
}

async fn reject(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<RefundDecision>> {
    let body: DecisionBody = optional_body(&body)?;
    let admin = body.admin()?;
    let decision = state
        .engine
        .cancellations
        .reject_refund(id, admin, body.notes.clone())
        .await?;
    Ok(Json(decision))
}
