use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use pasaj_db::models::{Order, Server, Trial};
use pasaj_db::repositories::{OrderRepository, PlanRepository, ServerRepository, TrialRepository};

use super::renewal::Standing;
use crate::panel::PanelClient;

/// Per-protocol subscription links, served off the client-facing host so
/// the admin panel's address stays private.
#[derive(Debug, Clone, Serialize)]
pub struct SubLinks {
    pub base: String,
    pub vless: String,
    pub vmess: String,
    pub trojan: String,
    pub clash: String,
    pub clash_meta: String,
}

pub fn sub_links(server: &Server, uuid: Uuid) -> SubLinks {
    let base = format!("{}/{}/", server.client_base().trim_end_matches('/'), uuid);
    SubLinks {
        vless: format!("{base}vless"),
        vmess: format!("{base}vmess"),
        trojan: format!("{base}trojan"),
        clash: format!("{base}clash/all.yml"),
        clash_meta: format!("{base}clash/meta/all.yml"),
        base,
    }
}

/// One of the user's subscriptions with whatever the panel currently
/// reports about it. `standing` is None when the panel is unreachable or
/// has dropped the record.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub uuid: Uuid,
    pub server_title: String,
    pub plan_name: Option<String>,
    pub is_trial: bool,
    pub links: SubLinks,
    pub standing: Option<Standing>,
}

#[derive(Clone)]
pub struct SubscriptionService {
    panel: Arc<dyn PanelClient>,
    orders: OrderRepository,
    trials: TrialRepository,
    servers: ServerRepository,
    plans: PlanRepository,
}

impl SubscriptionService {
    pub fn new(pool: PgPool, panel: Arc<dyn PanelClient>) -> Self {
        let orders = OrderRepository::new(pool.clone());
        let trials = TrialRepository::new(pool.clone());
        let servers = ServerRepository::new(pool.clone());
        let plans = PlanRepository::new(pool);
        Self {
            panel,
            orders,
            trials,
            servers,
            plans,
        }
    }

    /// Fetches the subscription's current remote state. Remaining days come
    /// from the user-side profile, which knows the package start date;
    /// the admin record supplies the configured limits.
    pub async fn standing(&self, server: &Server, uuid: Uuid) -> Result<Option<Standing>> {
        let Some(remote) = self.panel.get_user(server, uuid).await? else {
            return Ok(None);
        };
        let profile = self.panel.user_profile(server, uuid).await?;

        let (remaining_days, current_usage_gb) = match profile {
            Some(p) => (p.remaining_days, p.current_usage_gb),
            // Profile endpoint down: fall back to the admin-side counter.
            None => (0, remote.current_usage_gb),
        };

        Ok(Some(Standing {
            remaining_days,
            remaining_gb: remote.usage_limit_gb - current_usage_gb,
            current_usage_gb,
            usage_limit_gb: remote.usage_limit_gb,
            package_days: remote.package_days,
        }))
    }

    /// Everything the user owns, trials included, with best-effort remote
    /// state attached.
    pub async fn overview(&self, telegram_id: i64) -> Result<Vec<SubscriptionView>> {
        let orders = self.orders.get_for_user(telegram_id).await?;
        let trial = self.trials.get_for_user(telegram_id).await?;

        let mut views = Vec::with_capacity(orders.len() + 1);
        for order in orders {
            if let Some(view) = self.order_view(&order).await? {
                views.push(view);
            }
        }
        if let Some(trial) = trial {
            if let Some(view) = self.trial_view(&trial).await? {
                views.push(view);
            }
        }
        Ok(views)
    }

    async fn order_view(&self, order: &Order) -> Result<Option<SubscriptionView>> {
        let Some(server) = self.servers.get(order.server_id).await? else {
            warn!("Order {} references missing server {}", order.id, order.server_id);
            return Ok(None);
        };
        let plan_name = self
            .plans
            .get(order.plan_id)
            .await?
            .map(|plan| plan.name);

        let standing = self.fetch_standing(&server, order.uuid).await;
        Ok(Some(SubscriptionView {
            uuid: order.uuid,
            server_title: server.title.clone(),
            plan_name,
            is_trial: false,
            links: sub_links(&server, order.uuid),
            standing,
        }))
    }

    async fn trial_view(&self, trial: &Trial) -> Result<Option<SubscriptionView>> {
        let Some(server) = self.servers.get(trial.server_id).await? else {
            warn!("Trial {} references missing server {}", trial.id, trial.server_id);
            return Ok(None);
        };
        let standing = self.fetch_standing(&server, trial.uuid).await;
        Ok(Some(SubscriptionView {
            uuid: trial.uuid,
            server_title: server.title.clone(),
            plan_name: None,
            is_trial: true,
            links: sub_links(&server, trial.uuid),
            standing,
        }))
    }

    async fn fetch_standing(&self, server: &Server, uuid: Uuid) -> Option<Standing> {
        match self.standing(server, uuid).await {
            Ok(standing) => standing,
            Err(e) => {
                warn!("Could not fetch standing for {} on {}: {:#}", uuid, server.title, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn server(client_url: Option<&str>) -> Server {
        Server {
            id: 1,
            title: "eu-1".to_string(),
            panel_url: "https://panel.example.com/g7Hx2".to_string(),
            api_key: "key".to_string(),
            client_url: client_url.map(str::to_string),
            user_limit: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn links_hang_off_the_client_host_when_configured() {
        let uuid = Uuid::parse_str("7c9e6679-7425-40de-944b-e07fc1f90ae7").unwrap();
        let links = sub_links(&server(Some("https://cdn.example.com/sub")), uuid);

        assert_eq!(
            links.base,
            "https://cdn.example.com/sub/7c9e6679-7425-40de-944b-e07fc1f90ae7/"
        );
        assert_eq!(
            links.vless,
            "https://cdn.example.com/sub/7c9e6679-7425-40de-944b-e07fc1f90ae7/vless"
        );
        assert_eq!(
            links.clash,
            "https://cdn.example.com/sub/7c9e6679-7425-40de-944b-e07fc1f90ae7/clash/all.yml"
        );
        assert_eq!(
            links.clash_meta,
            "https://cdn.example.com/sub/7c9e6679-7425-40de-944b-e07fc1f90ae7/clash/meta/all.yml"
        );
    }

    #[test]
    fn links_fall_back_to_the_panel_host() {
        let uuid = Uuid::parse_str("7c9e6679-7425-40de-944b-e07fc1f90ae7").unwrap();
        let links = sub_links(&server(None), uuid);
        assert!(links.vmess.starts_with("https://panel.example.com/g7Hx2/"));
        assert!(links.vmess.ends_with("/vmess"));
    }
}
