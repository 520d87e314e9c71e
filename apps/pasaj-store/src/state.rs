use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;

use pasaj_db::repositories::{
    CouponRepository, EventRepository, OrderRepository, PlanRepository, ServerRepository,
    SettingsRepository, TrialRepository, UserRepository,
};

use crate::config::AppConfig;
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::panel::{HiddifyClient, PanelClient};
use crate::services::coupon_service::CouponService;
use crate::services::referral_service::ReferralService;
use crate::services::stats_service::StatsService;
use crate::services::store_service::StoreService;
use crate::services::subscription_service::SubscriptionService;
use crate::services::wallet_service::WalletService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    pub panel: Arc<dyn PanelClient>,
    pub notifier: Arc<dyn Notifier>,
    pub store: StoreService,
    pub wallet: WalletService,
    pub coupons: CouponService,
    pub referrals: ReferralService,
    pub subscriptions: SubscriptionService,
    pub stats: StatsService,
    pub users: UserRepository,
    pub servers: ServerRepository,
    pub plans: PlanRepository,
    pub orders: OrderRepository,
    pub trials: TrialRepository,
    pub coupon_repo: CouponRepository,
    pub settings: SettingsRepository,
    pub events: EventRepository,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Result<Self> {
        let panel: Arc<dyn PanelClient> = Arc::new(HiddifyClient::new()?);

        let notifier: Arc<dyn Notifier> = match &config.bot_token {
            Some(token) => Arc::new(TelegramNotifier::new(
                token.clone(),
                config.admin_chat_ids.clone(),
            )?),
            None => Arc::new(LogNotifier),
        };

        Ok(Self {
            store: StoreService::new(pool.clone(), panel.clone(), notifier.clone()),
            wallet: WalletService::new(pool.clone()),
            coupons: CouponService::new(pool.clone()),
            referrals: ReferralService::new(pool.clone()),
            subscriptions: SubscriptionService::new(pool.clone(), panel.clone()),
            stats: StatsService::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            servers: ServerRepository::new(pool.clone()),
            plans: PlanRepository::new(pool.clone()),
            orders: OrderRepository::new(pool.clone()),
            trials: TrialRepository::new(pool.clone()),
            coupon_repo: CouponRepository::new(pool.clone()),
            settings: SettingsRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            panel,
            notifier,
            pool,
            config,
        })
    }
}
