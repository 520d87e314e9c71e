use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::{internal_error, not_found, payment_error_response};
use crate::notify;
use crate::state::AppState;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Gate for everything under /admin. With no key configured the surface
/// stays closed entirely rather than open.
pub async fn require_admin_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.config.admin_api_key.as_deref() else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented != Some(expected) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}

/// Deletes blocked by rows that still reference the target come back as a
/// foreign key violation, which is a conflict, not a server fault.
fn is_reference_conflict(err: &anyhow::Error) -> bool {
    err.root_cause()
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_foreign_key_violation())
}

fn reference_conflict(what: &str) -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({ "error": format!("{what} is still referenced by other records") })),
    )
        .into_response()
}

// ---- Servers ----

pub async fn list_servers(State(state): State<AppState>) -> Response {
    match state.stats.server_loads().await {
        Ok(servers) => Json(json!({ "servers": servers })).into_response(),
        Err(e) => internal_error("Server listing failed", e),
    }
}

#[derive(Deserialize)]
pub struct ServerBody {
    pub title: String,
    pub panel_url: String,
    pub api_key: String,
    pub client_url: Option<String>,
    pub user_limit: Option<i64>,
}

/// Creates the server and pings it once so a typo'd URL or key shows up
/// in the response instead of at the first sale.
pub async fn create_server(State(state): State<AppState>, Json(req): Json<ServerBody>) -> Response {
    let id = match state
        .servers
        .create(
            &req.title,
            &req.panel_url,
            &req.api_key,
            req.client_url.as_deref(),
            req.user_limit,
        )
        .await
    {
        Ok(id) => id,
        Err(e) => return internal_error("Server creation failed", e),
    };

    let reachable = match state.servers.get(id).await {
        Ok(Some(server)) => match state.panel.ping(&server).await {
            Ok(()) => true,
            Err(e) => {
                warn!("New server {} does not answer pings: {:#}", req.title, e);
                false
            }
        },
        _ => false,
    };

    (
        StatusCode::CREATED,
        Json(json!({ "id": id, "reachable": reachable })),
    )
        .into_response()
}

pub async fn update_server(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ServerBody>,
) -> Response {
    match state.servers.get(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("server"),
        Err(e) => return internal_error("Server update failed", e),
    }

    match state
        .servers
        .update(
            id,
            &req.title,
            &req.panel_url,
            &req.api_key,
            req.client_url.as_deref(),
            req.user_limit,
        )
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Server update failed", e),
    }
}

#[derive(Deserialize)]
pub struct ActiveBody {
    pub active: bool,
}

pub async fn set_server_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ActiveBody>,
) -> Response {
    match state.servers.get(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("server"),
        Err(e) => return internal_error("Server update failed", e),
    }
    match state.servers.set_active(id, req.active).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Server update failed", e),
    }
}

pub async fn delete_server(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.servers.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) if is_reference_conflict(&e) => reference_conflict("server"),
        Err(e) => internal_error("Server deletion failed", e),
    }
}

/// Live view of one server: the panel's own report next to the subscriber
/// counts on both sides. Remote numbers degrade to null when the panel is
/// unreachable; the local ones always answer.
pub async fn server_status(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let server = match state.servers.get(id).await {
        Ok(Some(server)) => server,
        Ok(None) => return not_found("server"),
        Err(e) => return internal_error("Server status failed", e),
    };

    let local_subscribers = match state.stats.server_loads().await {
        Ok(loads) => loads
            .iter()
            .find(|load| load.id == id)
            .map_or(0, |load| load.subscribers),
        Err(e) => return internal_error("Server status failed", e),
    };

    let panel_report = match state.panel.server_status(&server).await {
        Ok(report) => report,
        Err(e) => {
            warn!("Status report from {} failed: {:#}", server.title, e);
            serde_json::Value::Null
        }
    };
    let remote_users = match state.panel.list_users(&server).await {
        Ok(users) => Some(users.len()),
        Err(e) => {
            warn!("User list from {} failed: {:#}", server.title, e);
            None
        }
    };

    Json(json!({
        "server": { "id": server.id, "title": server.title, "active": server.active },
        "local_subscribers": local_subscribers,
        "remote_users": remote_users,
        "panel": panel_report,
    }))
    .into_response()
}

// ---- Plans ----

pub async fn list_plans(State(state): State<AppState>) -> Response {
    match state.plans.get_all().await {
        Ok(plans) => Json(json!({ "plans": plans })).into_response(),
        Err(e) => internal_error("Plan listing failed", e),
    }
}

#[derive(Deserialize)]
pub struct NewPlanBody {
    pub name: String,
    pub size_gb: f64,
    pub days: i32,
    /// Price in Rials.
    pub price: i64,
    pub server_id: i64,
    pub description: Option<String>,
}

pub async fn create_plan(State(state): State<AppState>, Json(req): Json<NewPlanBody>) -> Response {
    match state.servers.get(req.server_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("server"),
        Err(e) => return internal_error("Plan creation failed", e),
    }

    match state
        .plans
        .create(
            &req.name,
            req.size_gb,
            req.days,
            req.price,
            req.server_id,
            req.description.as_deref(),
        )
        .await
    {
        Ok(id) => (StatusCode::CREATED, Json(json!({ "id": id }))).into_response(),
        Err(e) => internal_error("Plan creation failed", e),
    }
}

#[derive(Deserialize)]
pub struct PlanUpdateBody {
    pub name: String,
    pub size_gb: f64,
    pub days: i32,
    pub price: i64,
    pub description: Option<String>,
}

pub async fn update_plan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PlanUpdateBody>,
) -> Response {
    match state.plans.get(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("plan"),
        Err(e) => return internal_error("Plan update failed", e),
    }

    match state
        .plans
        .update(
            id,
            &req.name,
            req.size_gb,
            req.days,
            req.price,
            req.description.as_deref(),
        )
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Plan update failed", e),
    }
}

pub async fn set_plan_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ActiveBody>,
) -> Response {
    match state.plans.get(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("plan"),
        Err(e) => return internal_error("Plan update failed", e),
    }
    match state.plans.set_active(id, req.active).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Plan update failed", e),
    }
}

pub async fn delete_plan(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.plans.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) if is_reference_conflict(&e) => reference_conflict("plan"),
        Err(e) => internal_error("Plan deletion failed", e),
    }
}

// ---- Coupons ----

pub async fn list_coupons(State(state): State<AppState>) -> Response {
    match state.coupon_repo.get_all().await {
        Ok(coupons) => Json(json!({ "coupons": coupons })).into_response(),
        Err(e) => internal_error("Coupon listing failed", e),
    }
}

#[derive(Deserialize)]
pub struct NewCouponBody {
    /// Omit to have a code generated.
    pub code: Option<String>,
    pub discount_type: String,
    pub value: i64,
    pub usage_limit: Option<i64>,
    pub expires_at: Option<NaiveDate>,
}

pub async fn create_coupon(
    State(state): State<AppState>,
    Json(req): Json<NewCouponBody>,
) -> Response {
    if !matches!(req.discount_type.as_str(), "percentage" | "fixed") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "discount_type must be \"percentage\" or \"fixed\"" })),
        )
            .into_response();
    }

    if let Some(code) = req.code.as_deref() {
        match state.coupon_repo.code_exists(code.trim()).await {
            Ok(true) => {
                return (
                    StatusCode::CONFLICT,
                    Json(json!({ "error": "coupon code already exists" })),
                )
                    .into_response()
            }
            Ok(false) => {}
            Err(e) => return internal_error("Coupon creation failed", e),
        }
    }

    match state
        .coupons
        .create(
            req.code.as_deref(),
            &req.discount_type,
            req.value,
            req.usage_limit,
            req.expires_at,
        )
        .await
    {
        Ok(coupon) => (StatusCode::CREATED, Json(coupon)).into_response(),
        Err(e) => internal_error("Coupon creation failed", e),
    }
}

pub async fn set_coupon_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ActiveBody>,
) -> Response {
    match state.coupon_repo.get_by_id(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("coupon"),
        Err(e) => return internal_error("Coupon update failed", e),
    }
    match state.coupon_repo.set_active(id, req.active).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Coupon update failed", e),
    }
}

pub async fn delete_coupon(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.coupon_repo.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) if is_reference_conflict(&e) => reference_conflict("coupon"),
        Err(e) => internal_error("Coupon deletion failed", e),
    }
}

// ---- Users ----

#[derive(Deserialize)]
pub struct UserSearch {
    pub q: Option<String>,
}

pub async fn list_users(State(state): State<AppState>, Query(search): Query<UserSearch>) -> Response {
    let result = match search.q.as_deref() {
        Some(q) if !q.trim().is_empty() => state.users.search(q.trim()).await,
        _ => state.users.get_all().await,
    };
    match result {
        Ok(users) => Json(json!({ "users": users })).into_response(),
        Err(e) => internal_error("User listing failed", e),
    }
}

#[derive(Deserialize)]
pub struct BanBody {
    pub banned: bool,
}

pub async fn ban_user(
    State(state): State<AppState>,
    Path(telegram_id): Path<i64>,
    Json(req): Json<BanBody>,
) -> Response {
    match state.users.get(telegram_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("user"),
        Err(e) => return internal_error("Ban update failed", e),
    }
    match state.users.set_banned(telegram_id, req.banned).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Ban update failed", e),
    }
}

#[derive(Deserialize)]
pub struct CreditBody {
    /// Signed Rial amount; negative corrects an over-credit.
    pub amount: i64,
}

pub async fn credit_user(
    State(state): State<AppState>,
    Path(telegram_id): Path<i64>,
    Json(req): Json<CreditBody>,
) -> Response {
    match state.users.get(telegram_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("user"),
        Err(e) => return internal_error("Balance adjustment failed", e),
    }

    if let Err(e) = state.users.adjust_balance(telegram_id, req.amount).await {
        return internal_error("Balance adjustment failed", e);
    }
    let _ = state
        .events
        .log(
            Some(telegram_id),
            "admin_adjustment",
            &format!("{} Rials", req.amount),
        )
        .await;

    match state.users.get(telegram_id).await {
        Ok(Some(user)) => Json(json!({ "balance": user.balance })).into_response(),
        Ok(None) => not_found("user"),
        Err(e) => internal_error("Balance adjustment failed", e),
    }
}

#[derive(Deserialize)]
pub struct TrialBody {
    pub allowed: bool,
}

/// Re-arms (or revokes) a user's free trial eligibility. Re-arming also
/// clears the used trial record, otherwise the one-per-user rule would
/// still refuse the next attempt.
pub async fn set_trial(
    State(state): State<AppState>,
    Path(telegram_id): Path<i64>,
    Json(req): Json<TrialBody>,
) -> Response {
    match state.users.get(telegram_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("user"),
        Err(e) => return internal_error("Trial update failed", e),
    }
    if req.allowed {
        let spent = match state.trials.get_for_user(telegram_id).await {
            Ok(trial) => trial,
            Err(e) => return internal_error("Trial update failed", e),
        };
        if let Some(trial) = spent {
            if let Err(e) = state.trials.delete(trial.id).await {
                return internal_error("Trial update failed", e);
            }
        }
    }
    match state.users.set_trial_allowed(telegram_id, req.allowed).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Trial update failed", e),
    }
}

#[derive(Deserialize)]
pub struct CommentBody {
    pub comment: Option<String>,
}

/// Admin note attached to a user record. Null clears it.
pub async fn set_user_comment(
    State(state): State<AppState>,
    Path(telegram_id): Path<i64>,
    Json(req): Json<CommentBody>,
) -> Response {
    match state.users.get(telegram_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("user"),
        Err(e) => return internal_error("Comment update failed", e),
    }
    match state
        .users
        .set_comment(telegram_id, req.comment.as_deref())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Comment update failed", e),
    }
}

// ---- Payments ----

pub async fn pending_payments(State(state): State<AppState>) -> Response {
    match state.wallet.pending_payments().await {
        Ok(payments) => Json(json!({ "payments": payments })).into_response(),
        Err(e) => internal_error("Payment listing failed", e),
    }
}

pub async fn approve_payment(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.wallet.approve_payment(id).await {
        Ok(Ok(payment)) => {
            let _ = state
                .notifier
                .notify_user(payment.telegram_id, &notify::deposit_approved(payment.amount))
                .await;
            Json(payment).into_response()
        }
        Ok(Err(e)) => payment_error_response(e),
        Err(e) => internal_error("Payment approval failed", e),
    }
}

pub async fn reject_payment(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.wallet.reject_payment(id).await {
        Ok(Ok(payment)) => {
            let _ = state
                .notifier
                .notify_user(payment.telegram_id, &notify::deposit_rejected(payment.amount))
                .await;
            Json(payment).into_response()
        }
        Ok(Err(e)) => payment_error_response(e),
        Err(e) => internal_error("Payment rejection failed", e),
    }
}

// ---- Settings ----

pub async fn get_settings(State(state): State<AppState>) -> Response {
    match state.settings.load().await {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => internal_error("Settings read failed", e),
    }
}

#[derive(Deserialize)]
pub struct SettingsUpdate {
    /// 1 = default, 2 = advanced, 3 = fair.
    pub renewal_method: Option<i64>,
    pub advanced_renewal_days: Option<i64>,
    pub advanced_renewal_usage_gb: Option<f64>,
    pub trial_enabled: Option<bool>,
    pub trial_days: Option<i64>,
    pub trial_size_gb: Option<f64>,
    pub purchase_enabled: Option<bool>,
    pub renewal_enabled: Option<bool>,
    pub min_deposit: Option<i64>,
    pub referral_rate: Option<i64>,
    pub reminder_days: Option<i64>,
    pub reminder_usage_gb: Option<f64>,
}

/// Writes only the knobs the request carries, then answers with the full
/// effective settings.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<SettingsUpdate>,
) -> Response {
    let updates = [
        ("renewal_method", req.renewal_method.map(|v| v.to_string())),
        (
            "advanced_renewal_days",
            req.advanced_renewal_days.map(|v| v.to_string()),
        ),
        (
            "advanced_renewal_usage_gb",
            req.advanced_renewal_usage_gb.map(|v| v.to_string()),
        ),
        ("trial_enabled", req.trial_enabled.map(|v| v.to_string())),
        ("trial_days", req.trial_days.map(|v| v.to_string())),
        ("trial_size_gb", req.trial_size_gb.map(|v| v.to_string())),
        (
            "purchase_enabled",
            req.purchase_enabled.map(|v| v.to_string()),
        ),
        ("renewal_enabled", req.renewal_enabled.map(|v| v.to_string())),
        ("min_deposit", req.min_deposit.map(|v| v.to_string())),
        ("referral_rate", req.referral_rate.map(|v| v.to_string())),
        ("reminder_days", req.reminder_days.map(|v| v.to_string())),
        (
            "reminder_usage_gb",
            req.reminder_usage_gb.map(|v| v.to_string()),
        ),
    ];

    for (key, value) in updates {
        if let Some(value) = value {
            if let Err(e) = state.settings.set(key, &value).await {
                return internal_error("Settings update failed", e);
            }
        }
    }

    match state.settings.load().await {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => internal_error("Settings update failed", e),
    }
}

// ---- Dashboard ----

pub async fn stats(State(state): State<AppState>) -> Response {
    let totals = match state.stats.totals().await {
        Ok(totals) => totals,
        Err(e) => return internal_error("Stats failed", e),
    };
    match state.stats.server_loads().await {
        Ok(servers) => Json(json!({ "totals": totals, "servers": servers })).into_response(),
        Err(e) => internal_error("Stats failed", e),
    }
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub limit: Option<i64>,
}

pub async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    match state.events.recent(limit).await {
        Ok(events) => Json(json!({ "events": events })).into_response(),
        Err(e) => internal_error("Event listing failed", e),
    }
}
