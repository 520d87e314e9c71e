use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::{internal_error, not_found, payment_error_response};
use crate::state::AppState;
use crate::utils::format_toman;

pub async fn wallet(State(state): State<AppState>, Path(telegram_id): Path<i64>) -> Response {
    let user = match state.users.get(telegram_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return not_found("user"),
        Err(e) => return internal_error("Wallet lookup failed", e),
    };

    match state.wallet.payment_history(telegram_id).await {
        Ok(payments) => Json(json!({
            "balance": user.balance,
            "balance_display": format_toman(user.balance),
            "payments": payments,
        }))
        .into_response(),
        Err(e) => internal_error("Wallet lookup failed", e),
    }
}

#[derive(Deserialize)]
pub struct DepositRequest {
    pub telegram_id: i64,
    /// Deposit amount in Rials.
    pub amount: i64,
    /// "card" or "gateway".
    pub method: String,
    pub authority: Option<String>,
    pub receipt_path: Option<String>,
}

pub async fn submit_deposit(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> Response {
    match state
        .wallet
        .submit_payment(
            req.telegram_id,
            req.amount,
            &req.method,
            req.authority.as_deref(),
            req.receipt_path.as_deref(),
        )
        .await
    {
        Ok(Ok(payment_id)) => (
            StatusCode::CREATED,
            Json(json!({ "payment_id": payment_id, "status": "pending" })),
        )
            .into_response(),
        Ok(Err(e)) => payment_error_response(e),
        Err(e) => internal_error("Deposit submission failed", e),
    }
}
