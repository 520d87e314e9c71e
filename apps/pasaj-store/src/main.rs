use std::net::SocketAddr;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use dotenvy::dotenv;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod handlers;
mod jobs;
mod notify;
mod panel;
mod services;
mod state;
mod utils;

use crate::config::AppConfig;
use crate::jobs::Scheduler;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pasaj_store=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    info!("Store core starting");

    let pool = pasaj_db::connect(&config.database_url).await?;
    let state = AppState::new(pool, config)?;

    let scheduler_state = state.clone();
    tokio::spawn(async move {
        Scheduler::new(scheduler_state).start().await;
    });

    let listen_port = state.config.listen_port;

    let admin = Router::new()
        .route(
            "/servers",
            get(handlers::admin::list_servers).post(handlers::admin::create_server),
        )
        .route(
            "/servers/{id}",
            put(handlers::admin::update_server).delete(handlers::admin::delete_server),
        )
        .route("/servers/{id}/active", post(handlers::admin::set_server_active))
        .route("/servers/{id}/status", get(handlers::admin::server_status))
        .route(
            "/plans",
            get(handlers::admin::list_plans).post(handlers::admin::create_plan),
        )
        .route(
            "/plans/{id}",
            put(handlers::admin::update_plan).delete(handlers::admin::delete_plan),
        )
        .route("/plans/{id}/active", post(handlers::admin::set_plan_active))
        .route(
            "/coupons",
            get(handlers::admin::list_coupons).post(handlers::admin::create_coupon),
        )
        .route("/coupons/{id}", delete(handlers::admin::delete_coupon))
        .route("/coupons/{id}/active", post(handlers::admin::set_coupon_active))
        .route("/users", get(handlers::admin::list_users))
        .route("/users/{telegram_id}/ban", post(handlers::admin::ban_user))
        .route("/users/{telegram_id}/credit", post(handlers::admin::credit_user))
        .route("/users/{telegram_id}/trial", post(handlers::admin::set_trial))
        .route(
            "/users/{telegram_id}/comment",
            post(handlers::admin::set_user_comment),
        )
        .route("/payments/pending", get(handlers::admin::pending_payments))
        .route("/payments/{id}/approve", post(handlers::admin::approve_payment))
        .route("/payments/{id}/reject", post(handlers::admin::reject_payment))
        .route(
            "/settings",
            get(handlers::admin::get_settings).put(handlers::admin::update_settings),
        )
        .route("/stats", get(handlers::admin::stats))
        .route("/events", get(handlers::admin::recent_events))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::admin::require_admin_key,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/users/start", post(handlers::users::start))
        .route(
            "/users/{telegram_id}/subscriptions",
            get(handlers::users::subscriptions),
        )
        .route(
            "/users/{telegram_id}/referral",
            get(handlers::users::referral_info),
        )
        .route("/users/{telegram_id}/wallet", get(handlers::wallet::wallet))
        .route("/wallet/deposits", post(handlers::wallet::submit_deposit))
        .route("/store", get(handlers::store::storefront))
        .route("/store/purchase", post(handlers::store::purchase))
        .route("/store/trial", post(handlers::store::start_trial))
        .route("/store/renew", post(handlers::store::renew))
        .route("/store/coupon/check", post(handlers::store::check_coupon))
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], listen_port));
    info!("Store API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
