use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use crate::notify;
use crate::services::renewal::Standing;
use crate::state::AppState;

/// Periodic work: panel liveness probes, usage refreshes and expiry
/// reminders. One loop, sub-tasks on their own cadences.
pub struct Scheduler {
    state: AppState,
}

const PING_EVERY_MIN: u64 = 5;
const USAGE_SYNC_EVERY_MIN: u64 = 10;
const SWEEP_EVERY_MIN: u64 = 24 * 60;

impl Scheduler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn start(&self) {
        info!("Starting background scheduler...");
        let mut tick = interval(Duration::from_secs(60));
        let mut minute_counter: u64 = 0;

        loop {
            tick.tick().await;
            minute_counter += 1;

            if minute_counter % PING_EVERY_MIN == 0 {
                if let Err(e) = self.ping_panels().await {
                    error!("Scheduler error (panel ping): {:#}", e);
                }
            }

            if minute_counter % USAGE_SYNC_EVERY_MIN == 0 {
                if let Err(e) = self.sync_usage().await {
                    error!("Scheduler error (usage sync): {:#}", e);
                }
            }

            if minute_counter % SWEEP_EVERY_MIN == 0 {
                if let Err(e) = self.sweep_subscriptions().await {
                    error!("Scheduler error (subscription sweep): {:#}", e);
                }
                minute_counter = 0;
            }
        }
    }

    async fn ping_panels(&self) -> anyhow::Result<()> {
        for server in self.state.servers.get_active().await? {
            if let Err(e) = self.state.panel.ping(&server).await {
                warn!("Server {} did not answer the ping: {:#}", server.title, e);
            }
        }
        Ok(())
    }

    async fn sync_usage(&self) -> anyhow::Result<()> {
        for server in self.state.servers.get_active().await? {
            if let Err(e) = self.state.panel.sync_usage(&server).await {
                warn!("Usage sync on {} failed: {:#}", server.title, e);
            }
        }
        Ok(())
    }

    /// Walks active orders once a day. Dead subscriptions are retired so
    /// they stop counting against server load; live ones close to running
    /// out of days or traffic earn their owner a nudge. A later renewal
    /// flips a retired order back to active.
    async fn sweep_subscriptions(&self) -> anyhow::Result<()> {
        let settings = self.state.settings.load().await?;
        let orders = self.state.orders.get_active().await?;
        if orders.is_empty() {
            return Ok(());
        }

        let mut sent = 0usize;
        let mut retired = 0usize;
        for order in orders {
            let Some(server) = self.state.servers.get(order.server_id).await? else {
                continue;
            };
            let standing = match self.state.subscriptions.standing(&server, order.uuid).await {
                Ok(Some(standing)) => standing,
                Ok(None) => {
                    // The panel no longer knows this uuid; the order is over.
                    self.state.orders.update_status(order.id, "expired").await?;
                    retired += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Sweep of {} skipped: {:#}", order.uuid, e);
                    continue;
                }
            };

            if standing.is_exhausted() {
                self.state.orders.update_status(order.id, "expired").await?;
                retired += 1;
                continue;
            }

            if needs_reminder(&standing, settings.reminder_days, settings.reminder_usage_gb) {
                let text = notify::expiry_reminder(
                    &server.title,
                    standing.remaining_days,
                    standing.remaining_gb.max(0.0),
                );
                let _ = self
                    .state
                    .notifier
                    .notify_user(order.telegram_id, &text)
                    .await;
                sent += 1;
            }
        }

        if sent > 0 || retired > 0 {
            info!(
                "Subscription sweep: {} reminders sent, {} orders retired",
                sent, retired
            );
        }
        Ok(())
    }
}

/// Low on days or low on traffic, but not already dead: exhausted
/// subscriptions get no reminder, there is nothing left to save.
fn needs_reminder(standing: &Standing, day_threshold: i64, usage_threshold_gb: f64) -> bool {
    if standing.is_exhausted() {
        return false;
    }
    standing.remaining_days <= day_threshold || standing.remaining_gb <= usage_threshold_gb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(remaining_days: i64, remaining_gb: f64) -> Standing {
        Standing {
            remaining_days,
            remaining_gb,
            current_usage_gb: 50.0 - remaining_gb,
            usage_limit_gb: 50.0,
            package_days: 30,
        }
    }

    #[test]
    fn reminders_fire_on_either_low_threshold() {
        assert!(needs_reminder(&standing(2, 40.0), 3, 3.0));
        assert!(needs_reminder(&standing(20, 1.5), 3, 3.0));
        assert!(!needs_reminder(&standing(20, 40.0), 3, 3.0));
    }

    #[test]
    fn dead_subscriptions_are_left_alone() {
        assert!(!needs_reminder(&standing(0, 40.0), 3, 3.0));
        assert!(!needs_reminder(&standing(20, 0.0), 3, 3.0));
    }
}
