use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use pasaj_db::models::{Plan, RenewalMethod, Server, User};
use pasaj_db::repositories::{
    EventRepository, OrderRepository, PlanRepository, ServerRepository, SettingsRepository,
    TrialRepository, UserRepository,
};

use crate::notify::{self, Notifier};
use crate::panel::{NewRemoteUser, PanelClient, RemoteUserPatch};

use super::balancer;
use super::coupon_service::{CouponRejection, CouponService};
use super::provision::{self, Debit, ProvisionError};
use super::referral_service::ReferralService;
use super::renewal::{self, RenewalParams};
use super::subscription_service::{sub_links, SubLinks, SubscriptionService};
use super::wallet_service::WalletService;

/// Why the store turned a request down. These are expected outcomes the
/// caller renders for the user; infrastructure failures stay `anyhow`.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum StoreRejection {
    #[error("purchases are currently disabled")]
    PurchasesDisabled,
    #[error("renewals are currently disabled")]
    RenewalsDisabled,
    #[error("free trials are currently disabled")]
    TrialsDisabled,
    #[error("no server is open for new subscriptions")]
    ServiceFull,
    #[error("this server is not available right now")]
    ServerUnavailable,
    #[error("account is banned")]
    Banned,
    #[error("account not found")]
    UnknownUser,
    #[error("plan not found or retired")]
    UnknownPlan,
    #[error("subscription not found")]
    UnknownSubscription,
    #[error("free trial already used")]
    TrialAlreadyUsed,
    #[error("insufficient balance, {shortfall} Rials short")]
    InsufficientBalance { shortfall: i64 },
    #[error("renewal opens once {days} days or {usage_gb} GB remain")]
    RenewalNotOpen { days: i64, usage_gb: f64 },
    #[error(transparent)]
    Coupon(#[from] CouponRejection),
}

#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub order_id: i64,
    pub uuid: Uuid,
    pub price_paid: i64,
    pub links: SubLinks,
}

#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub uuid: Uuid,
    pub days: i64,
    pub size_gb: f64,
    pub links: SubLinks,
}

#[derive(Debug, Clone)]
pub struct RenewalOutcome {
    pub uuid: Uuid,
    pub price_paid: i64,
    pub params: RenewalParams,
}

/// Sales flows: storefront listing, purchases, free trials and renewals.
/// Every paid flow runs debit, panel call and local write through the
/// provisioning primitive so a failure on any step unwinds the ones before.
#[derive(Clone)]
pub struct StoreService {
    pool: PgPool,
    panel: Arc<dyn PanelClient>,
    notifier: Arc<dyn Notifier>,
    users: UserRepository,
    servers: ServerRepository,
    plans: PlanRepository,
    orders: OrderRepository,
    trials: TrialRepository,
    settings: SettingsRepository,
    events: EventRepository,
    wallet: WalletService,
    subscriptions: SubscriptionService,
    referrals: ReferralService,
    coupons: CouponService,
}

impl StoreService {
    pub fn new(pool: PgPool, panel: Arc<dyn PanelClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            servers: ServerRepository::new(pool.clone()),
            plans: PlanRepository::new(pool.clone()),
            orders: OrderRepository::new(pool.clone()),
            trials: TrialRepository::new(pool.clone()),
            settings: SettingsRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            wallet: WalletService::new(pool.clone()),
            subscriptions: SubscriptionService::new(pool.clone(), panel.clone()),
            referrals: ReferralService::new(pool.clone()),
            coupons: CouponService::new(pool.clone()),
            pool,
            panel,
            notifier,
        }
    }

    /// Picks the server new business lands on and lists its active plans.
    /// The balancer decides before plans are shown, so the prices on screen
    /// always belong to the server that will host the purchase.
    pub async fn storefront(&self) -> Result<Result<(Server, Vec<Plan>), StoreRejection>> {
        let settings = self.settings.load().await?;
        if !settings.purchase_enabled {
            return Ok(Err(StoreRejection::PurchasesDisabled));
        }

        let Some(server) = balancer::select_best(self.servers.get_with_load().await?) else {
            return Ok(Err(StoreRejection::ServiceFull));
        };
        let plans = self.plans.get_active_for_server(server.id).await?;
        Ok(Ok((server, plans)))
    }

    pub async fn purchase(
        &self,
        telegram_id: i64,
        plan_id: i64,
        coupon_code: Option<&str>,
    ) -> Result<Result<PurchaseOutcome, StoreRejection>> {
        let settings = self.settings.load().await?;
        if !settings.purchase_enabled {
            return Ok(Err(StoreRejection::PurchasesDisabled));
        }

        if let Err(rejection) = self.buyer(telegram_id).await? {
            return Ok(Err(rejection));
        }

        let Some(plan) = self.plans.get(plan_id).await? else {
            return Ok(Err(StoreRejection::UnknownPlan));
        };
        if !plan.active {
            return Ok(Err(StoreRejection::UnknownPlan));
        }
        let Some(server) = self.servers.get(plan.server_id).await? else {
            return Ok(Err(StoreRejection::ServerUnavailable));
        };
        if !server.active {
            return Ok(Err(StoreRejection::ServerUnavailable));
        }

        let coupon = match coupon_code {
            Some(code) => match self.coupons.validate(code, telegram_id).await? {
                Ok(coupon) => Some(coupon),
                Err(rejection) => return Ok(Err(rejection.into())),
            },
            None => None,
        };
        let price = coupon
            .as_ref()
            .map_or(plan.price, |c| c.apply_discount(plan.price));
        let coupon_id = coupon.as_ref().map(|c| c.id);

        let new_user = NewRemoteUser {
            name: format!("User_{telegram_id}"),
            usage_limit_gb: plan.size_gb,
            package_days: plan.days as i64,
            telegram_id: Some(telegram_id),
            comment: Some(format!("Paid by wallet. Plan: {}", plan.name)),
        };

        let result = provision::run(
            || self.wallet.try_debit(telegram_id, price),
            || self.panel.create_user(&server, &new_user),
            |uuid| self.commit_purchase(uuid, telegram_id, &plan, price, coupon_id),
            |uuid| self.panel.delete_user(&server, uuid),
            || self.wallet.credit(telegram_id, price),
        )
        .await;

        let (uuid, order_id) = match result {
            Ok(pair) => pair,
            Err(ProvisionError::InsufficientBalance { shortfall }) => {
                return Ok(Err(StoreRejection::InsufficientBalance { shortfall }));
            }
            Err(other) => {
                return Err(anyhow::Error::new(other)
                    .context(format!("Purchase for user {telegram_id} failed")));
            }
        };

        info!(
            "User {} bought plan {} on {} for {} Rials (order {})",
            telegram_id, plan.name, server.title, price, order_id
        );
        let _ = self
            .events
            .log(
                Some(telegram_id),
                "purchase",
                &format!("order {order_id}, plan {}, {} Rials", plan.name, price),
            )
            .await;

        // Commission and notifications ride behind the sale; none of them
        // can unwind it.
        self.reward_referrer(telegram_id, price, settings.referral_rate).await;
        let links = sub_links(&server, uuid);
        let _ = self
            .notifier
            .notify_user(
                telegram_id,
                &notify::purchase_receipt(&plan.name, &server.title, price, &links.base),
            )
            .await;
        let _ = self
            .notifier
            .notify_admins(&notify::admin_sale_report(
                &plan.name,
                &server.title,
                telegram_id,
                price,
            ))
            .await;

        Ok(Ok(PurchaseOutcome {
            order_id,
            uuid,
            price_paid: price,
            links,
        }))
    }

    pub async fn start_trial(&self, telegram_id: i64) -> Result<Result<TrialOutcome, StoreRejection>> {
        let settings = self.settings.load().await?;
        if !settings.trial_enabled {
            return Ok(Err(StoreRejection::TrialsDisabled));
        }

        let user = match self.buyer(telegram_id).await? {
            Ok(user) => user,
            Err(rejection) => return Ok(Err(rejection)),
        };
        if !user.trial_allowed || self.trials.get_for_user(telegram_id).await?.is_some() {
            return Ok(Err(StoreRejection::TrialAlreadyUsed));
        }

        let Some(server) = balancer::select_best(self.servers.get_with_load().await?) else {
            return Ok(Err(StoreRejection::ServiceFull));
        };

        let new_user = NewRemoteUser {
            name: format!("TestUser_{telegram_id}"),
            usage_limit_gb: settings.trial_size_gb,
            package_days: settings.trial_days,
            telegram_id: Some(telegram_id),
            comment: Some("Free test subscription".to_string()),
        };

        let result = provision::run(
            || async { anyhow::Ok(Debit::Applied) },
            || self.panel.create_user(&server, &new_user),
            |uuid| self.commit_trial(uuid, telegram_id, server.id),
            |uuid| self.panel.delete_user(&server, uuid),
            || async { anyhow::Ok(()) },
        )
        .await;

        let uuid = match result {
            Ok((uuid, ())) => uuid,
            Err(other) => {
                return Err(anyhow::Error::new(other)
                    .context(format!("Trial for user {telegram_id} failed")));
            }
        };

        info!("User {} started a trial on {}", telegram_id, server.title);
        let _ = self
            .events
            .log(Some(telegram_id), "trial", &format!("server {}", server.title))
            .await;
        let links = sub_links(&server, uuid);
        let _ = self
            .notifier
            .notify_user(
                telegram_id,
                &notify::trial_ready(settings.trial_days, settings.trial_size_gb, &links.base),
            )
            .await;
        let _ = self
            .notifier
            .notify_admins(&format!(
                "Trial started: user {} on {}.",
                telegram_id, server.title
            ))
            .await;

        Ok(Ok(TrialOutcome {
            uuid,
            days: settings.trial_days,
            size_gb: settings.trial_size_gb,
            links,
        }))
    }

    pub async fn renew(
        &self,
        telegram_id: i64,
        sub_uuid: Uuid,
        plan_id: i64,
    ) -> Result<Result<RenewalOutcome, StoreRejection>> {
        let settings = self.settings.load().await?;
        if !settings.renewal_enabled {
            return Ok(Err(StoreRejection::RenewalsDisabled));
        }

        if let Err(rejection) = self.buyer(telegram_id).await? {
            return Ok(Err(rejection));
        }

        // The subscription may be a paid order or the free trial.
        let (server_id, order_id) = match self.orders.get_by_uuid(sub_uuid).await? {
            Some(order) if order.telegram_id == telegram_id => (order.server_id, Some(order.id)),
            Some(_) => return Ok(Err(StoreRejection::UnknownSubscription)),
            None => match self.trials.get_for_user(telegram_id).await? {
                Some(trial) if trial.uuid == sub_uuid => (trial.server_id, None),
                _ => return Ok(Err(StoreRejection::UnknownSubscription)),
            },
        };

        let Some(server) = self.servers.get(server_id).await? else {
            return Ok(Err(StoreRejection::ServerUnavailable));
        };
        let Some(plan) = self.plans.get(plan_id).await? else {
            return Ok(Err(StoreRejection::UnknownPlan));
        };
        // Plans are priced per server; a renewal buys from the same shelf.
        if !plan.active || plan.server_id != server.id {
            return Ok(Err(StoreRejection::UnknownPlan));
        }

        let Some(standing) = self.subscriptions.standing(&server, sub_uuid).await? else {
            return Ok(Err(StoreRejection::UnknownSubscription));
        };

        if settings.renewal_method == RenewalMethod::Advanced
            && !renewal::advanced_gate_open(&standing, &settings)
        {
            return Ok(Err(StoreRejection::RenewalNotOpen {
                days: settings.advanced_renewal_days,
                usage_gb: settings.advanced_renewal_usage_gb,
            }));
        }

        let params = renewal::compute(settings.renewal_method, &standing, &plan);
        let patch = RemoteUserPatch {
            usage_limit_gb: Some(params.usage_limit_gb),
            package_days: Some(params.package_days),
            current_usage_gb: params.reset_usage.then_some(0.0),
            comment: Some(format!("Renewed by wallet. Plan: {}", plan.name)),
            enabled: Some(true),
        };
        // Counter-patch that puts the old numbers back if the local write
        // fails after the panel already applied the renewal.
        let restore = RemoteUserPatch {
            usage_limit_gb: Some(standing.usage_limit_gb),
            package_days: Some(standing.package_days),
            current_usage_gb: params.reset_usage.then_some(standing.current_usage_gb),
            comment: None,
            enabled: None,
        };

        let price = plan.price;
        let result = provision::run(
            || self.wallet.try_debit(telegram_id, price),
            || self.panel.update_user(&server, sub_uuid, &patch),
            |_| self.commit_renewal(order_id, &plan, price),
            |_| self.panel.update_user(&server, sub_uuid, &restore),
            || self.wallet.credit(telegram_id, price),
        )
        .await;

        match result {
            Ok(_) => {}
            Err(ProvisionError::InsufficientBalance { shortfall }) => {
                return Ok(Err(StoreRejection::InsufficientBalance { shortfall }));
            }
            Err(other) => {
                return Err(anyhow::Error::new(other)
                    .context(format!("Renewal of {sub_uuid} for user {telegram_id} failed")));
            }
        }

        info!(
            "User {} renewed {} with plan {} for {} Rials",
            telegram_id, sub_uuid, plan.name, price
        );
        let _ = self
            .events
            .log(
                Some(telegram_id),
                "renewal",
                &format!("subscription {sub_uuid}, plan {}, {} Rials", plan.name, price),
            )
            .await;
        let _ = self
            .notifier
            .notify_user(telegram_id, &notify::renewal_receipt(&plan.name, price))
            .await;

        Ok(Ok(RenewalOutcome {
            uuid: sub_uuid,
            price_paid: price,
            params,
        }))
    }

    /// Shared buyer gate: the account must exist and not be banned.
    async fn buyer(&self, telegram_id: i64) -> Result<Result<User, StoreRejection>> {
        let Some(user) = self.users.get(telegram_id).await? else {
            return Ok(Err(StoreRejection::UnknownUser));
        };
        if user.banned {
            return Ok(Err(StoreRejection::Banned));
        }
        Ok(Ok(user))
    }

    /// Writes the local order and burns the coupon in one transaction.
    /// Runs as the commit step of a provisioning flow: when anything here
    /// fails, the remote user is deleted and the debit refunded.
    async fn commit_purchase(
        &self,
        uuid: Uuid,
        telegram_id: i64,
        plan: &Plan,
        price: i64,
        coupon_id: Option<i64>,
    ) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open purchase transaction")?;

        let order_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO orders (telegram_id, plan_id, server_id, uuid, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(telegram_id)
        .bind(plan.id)
        .bind(plan.server_id)
        .bind(uuid)
        .bind(price)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert order")?;

        if let Some(coupon_id) = coupon_id {
            if let Err(rejection) = CouponService::consume(&mut tx, coupon_id, telegram_id).await? {
                // The quote went stale between validation and payment.
                anyhow::bail!("Coupon no longer applies: {rejection}");
            }
        }

        tx.commit().await.context("Failed to commit purchase")?;
        Ok(order_id)
    }

    /// Records the trial and spends the account's one allowance together.
    /// The unique constraint on the trial row is the real gate; a racing
    /// second trial fails here and gets unwound.
    async fn commit_trial(&self, uuid: Uuid, telegram_id: i64, server_id: i64) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open trial transaction")?;

        sqlx::query("INSERT INTO trials (telegram_id, server_id, uuid) VALUES ($1, $2, $3)")
            .bind(telegram_id)
            .bind(server_id)
            .bind(uuid)
            .execute(&mut *tx)
            .await
            .context("Failed to record trial")?;

        sqlx::query("UPDATE users SET trial_allowed = FALSE WHERE telegram_id = $1")
            .bind(telegram_id)
            .execute(&mut *tx)
            .await
            .context("Failed to spend trial allowance")?;

        tx.commit().await.context("Failed to commit trial")
    }

    /// Local bookkeeping for a renewal. Orders move onto the renewed plan;
    /// a trial has no order row to touch.
    async fn commit_renewal(&self, order_id: Option<i64>, plan: &Plan, price: i64) -> Result<()> {
        match order_id {
            Some(id) => self.orders.record_renewal(id, plan.id, price).await,
            None => Ok(()),
        }
    }

    async fn reward_referrer(&self, buyer_id: i64, price: i64, rate: i64) {
        match self.referrals.apply_commission(buyer_id, price, rate).await {
            Ok(Some((referrer_id, amount))) => {
                let _ = self
                    .events
                    .log(
                        Some(referrer_id),
                        "commission",
                        &format!("{amount} Rials from buyer {buyer_id}"),
                    )
                    .await;
                let _ = self
                    .notifier
                    .notify_user(referrer_id, &notify::commission_credited(amount))
                    .await;
            }
            Ok(None) => {}
            Err(e) => warn!("Commission for buyer {} failed: {:#}", buyer_id, e),
        }
    }
}
