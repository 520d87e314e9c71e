use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{internal_error, rejection_response};
use crate::state::AppState;
use crate::utils::format_toman;

pub async fn storefront(State(state): State<AppState>) -> Response {
    match state.store.storefront().await {
        Ok(Ok((server, plans))) => Json(json!({
            "server": { "id": server.id, "title": server.title },
            "plans": plans,
        }))
        .into_response(),
        Ok(Err(rejection)) => rejection_response(rejection),
        Err(e) => internal_error("Storefront listing failed", e),
    }
}

#[derive(Deserialize)]
pub struct PurchaseRequest {
    pub telegram_id: i64,
    pub plan_id: i64,
    pub coupon_code: Option<String>,
}

pub async fn purchase(
    State(state): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> Response {
    match state
        .store
        .purchase(req.telegram_id, req.plan_id, req.coupon_code.as_deref())
        .await
    {
        Ok(Ok(outcome)) => (
            StatusCode::CREATED,
            Json(json!({
                "order_id": outcome.order_id,
                "uuid": outcome.uuid,
                "price_paid": outcome.price_paid,
                "price_display": format_toman(outcome.price_paid),
                "links": outcome.links,
            })),
        )
            .into_response(),
        Ok(Err(rejection)) => rejection_response(rejection),
        Err(e) => internal_error("Purchase failed", e),
    }
}

#[derive(Deserialize)]
pub struct TrialRequest {
    pub telegram_id: i64,
}

pub async fn start_trial(State(state): State<AppState>, Json(req): Json<TrialRequest>) -> Response {
    match state.store.start_trial(req.telegram_id).await {
        Ok(Ok(outcome)) => (
            StatusCode::CREATED,
            Json(json!({
                "uuid": outcome.uuid,
                "days": outcome.days,
                "size_gb": outcome.size_gb,
                "links": outcome.links,
            })),
        )
            .into_response(),
        Ok(Err(rejection)) => rejection_response(rejection),
        Err(e) => internal_error("Trial provisioning failed", e),
    }
}

#[derive(Deserialize)]
pub struct RenewRequest {
    pub telegram_id: i64,
    pub uuid: Uuid,
    pub plan_id: i64,
}

pub async fn renew(State(state): State<AppState>, Json(req): Json<RenewRequest>) -> Response {
    match state.store.renew(req.telegram_id, req.uuid, req.plan_id).await {
        Ok(Ok(outcome)) => Json(json!({
            "uuid": outcome.uuid,
            "price_paid": outcome.price_paid,
            "price_display": format_toman(outcome.price_paid),
            "usage_limit_gb": outcome.params.usage_limit_gb,
            "package_days": outcome.params.package_days,
            "usage_reset": outcome.params.reset_usage,
        }))
        .into_response(),
        Ok(Err(rejection)) => rejection_response(rejection),
        Err(e) => internal_error("Renewal failed", e),
    }
}

#[derive(Deserialize)]
pub struct CouponCheckRequest {
    pub telegram_id: i64,
    pub code: String,
    /// Order amount in Rials to quote against, if the caller has one.
    pub amount: Option<i64>,
}

pub async fn check_coupon(
    State(state): State<AppState>,
    Json(req): Json<CouponCheckRequest>,
) -> Response {
    match state.coupons.validate(&req.code, req.telegram_id).await {
        Ok(Ok(coupon)) => {
            let quoted = req.amount.map(|amount| coupon.apply_discount(amount));
            Json(json!({
                "valid": true,
                "discount_type": coupon.discount_type,
                "value": coupon.value,
                "quoted_amount": quoted,
            }))
            .into_response()
        }
        Ok(Err(rejection)) => (
            StatusCode::CONFLICT,
            Json(json!({ "valid": false, "error": rejection.to_string() })),
        )
            .into_response(),
        Err(e) => internal_error("Coupon check failed", e),
    }
}
