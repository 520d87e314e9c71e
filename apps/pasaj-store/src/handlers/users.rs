use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::{internal_error, not_found};
use crate::services::referral_service::{parse_start_payload, referral_link, Registration};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StartRequest {
    pub telegram_id: i64,
    pub full_name: String,
    pub username: Option<String>,
    /// Raw /start payload, e.g. "ref_123456".
    pub payload: Option<String>,
}

/// First contact: registers the user and records the referral edge when
/// the start payload carries one. Referral problems never fail the start.
pub async fn start(State(state): State<AppState>, Json(req): Json<StartRequest>) -> Response {
    let user = match state
        .users
        .upsert(req.telegram_id, &req.full_name, req.username.as_deref())
        .await
    {
        Ok(user) => user,
        Err(e) => return internal_error("User registration failed", e),
    };

    let referrer = req.payload.as_deref().and_then(parse_start_payload);
    let referral = match referrer {
        Some(referrer_id) => match state.referrals.register(referrer_id, req.telegram_id).await {
            Ok(Ok(Registration::Created)) => json!("created"),
            Ok(Ok(Registration::AlreadyRegistered)) => json!("already_registered"),
            Ok(Err(rejection)) => json!(rejection.to_string()),
            Err(e) => {
                warn!("Referral registration failed for {}: {:#}", req.telegram_id, e);
                json!(null)
            }
        },
        None => json!(null),
    };

    Json(json!({ "user": user, "referral": referral })).into_response()
}

pub async fn subscriptions(
    State(state): State<AppState>,
    Path(telegram_id): Path<i64>,
) -> Response {
    match state.subscriptions.overview(telegram_id).await {
        Ok(views) => Json(json!({ "subscriptions": views })).into_response(),
        Err(e) => internal_error("Subscription overview failed", e),
    }
}

pub async fn referral_info(
    State(state): State<AppState>,
    Path(telegram_id): Path<i64>,
) -> Response {
    match state.users.exists(telegram_id).await {
        Ok(true) => {}
        Ok(false) => return not_found("user"),
        Err(e) => return internal_error("Referral lookup failed", e),
    }

    match state.referrals.stats(telegram_id).await {
        Ok(stats) => Json(json!({
            "link": referral_link(&state.config.bot_username, telegram_id),
            "referred_count": stats.referred_count,
            "total_commission": stats.total_commission,
        }))
        .into_response(),
        Err(e) => internal_error("Referral lookup failed", e),
    }
}
