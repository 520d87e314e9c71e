pub mod admin;
pub mod health;
pub mod store;
pub mod users;
pub mod wallet;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::services::store_service::StoreRejection;
use crate::services::wallet_service::PaymentError;

/// Maps an expected store rejection to the HTTP answer the caller renders.
pub fn rejection_response(rejection: StoreRejection) -> Response {
    use StoreRejection::*;
    let status = match rejection {
        PurchasesDisabled | RenewalsDisabled | TrialsDisabled | ServiceFull
        | ServerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        Banned => StatusCode::FORBIDDEN,
        UnknownUser | UnknownPlan | UnknownSubscription => StatusCode::NOT_FOUND,
        TrialAlreadyUsed | InsufficientBalance { .. } | RenewalNotOpen { .. } | Coupon(_) => {
            StatusCode::CONFLICT
        }
    };
    (status, Json(json!({ "error": rejection.to_string() }))).into_response()
}

pub fn payment_error_response(error: PaymentError) -> Response {
    let status = match error {
        PaymentError::BelowMinimum { .. } => StatusCode::BAD_REQUEST,
        PaymentError::NotFound => StatusCode::NOT_FOUND,
        PaymentError::AlreadyDecided => StatusCode::CONFLICT,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

/// Logs the failure and answers 500 with a generic body.
pub fn internal_error(context: &str, err: anyhow::Error) -> Response {
    tracing::error!("{}: {:#}", context, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal error" })),
    )
        .into_response()
}

pub fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("{what} not found") })),
    )
        .into_response()
}
