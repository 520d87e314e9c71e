use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::utils::format_toman;

/// Outbound notification seam. Call sites treat delivery as best-effort;
/// a failed send never rolls back store state.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_user(&self, telegram_id: i64, text: &str) -> Result<()>;

    async fn notify_admins(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    token: String,
    admin_chat_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(token: String, admin_chat_ids: Vec<i64>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build Telegram HTTP client")?;
        Ok(Self {
            client,
            token,
            admin_chat_ids,
        })
    }

    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let resp = self
            .client
            .post(&url)
            .json(&SendMessage { chat_id, text })
            .send()
            .await
            .context("Telegram request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Telegram returned {} for chat {}", resp.status(), chat_id);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_user(&self, telegram_id: i64, text: &str) -> Result<()> {
        self.send(telegram_id, text).await
    }

    async fn notify_admins(&self, text: &str) -> Result<()> {
        for &chat_id in &self.admin_chat_ids {
            if let Err(e) = self.send(chat_id, text).await {
                warn!("Admin notification to {} failed: {:#}", chat_id, e);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(())
    }
}

/// Stand-in when no bot token is configured; messages land in the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_user(&self, telegram_id: i64, text: &str) -> Result<()> {
        info!("Notification for user {}: {}", telegram_id, text);
        Ok(())
    }

    async fn notify_admins(&self, text: &str) -> Result<()> {
        info!("Admin notification: {}", text);
        Ok(())
    }
}

// Message templates. Kept together so wording changes stay in one place.

pub fn purchase_receipt(plan_name: &str, server_title: &str, paid_rial: i64, link: &str) -> String {
    format!(
        "Your subscription is ready.\nPlan: {}\nServer: {}\nPaid: {}\nSubscription link: {}",
        plan_name,
        server_title,
        format_toman(paid_rial),
        link
    )
}

pub fn admin_sale_report(
    plan_name: &str,
    server_title: &str,
    telegram_id: i64,
    paid_rial: i64,
) -> String {
    format!(
        "New sale: {} on {} to user {} for {}.",
        plan_name,
        server_title,
        telegram_id,
        format_toman(paid_rial)
    )
}

pub fn renewal_receipt(plan_name: &str, paid_rial: i64) -> String {
    format!(
        "Your subscription was renewed with plan {} for {}.",
        plan_name,
        format_toman(paid_rial)
    )
}

pub fn trial_ready(days: i64, size_gb: f64, link: &str) -> String {
    format!(
        "Your free trial is active: {} day(s), {} GB.\nSubscription link: {}",
        days, size_gb, link
    )
}

pub fn commission_credited(amount_rial: i64) -> String {
    format!(
        "Referral bonus: {} was credited to your wallet for a referred purchase.",
        format_toman(amount_rial)
    )
}

pub fn deposit_approved(amount_rial: i64) -> String {
    format!("Deposit approved: {} added to your wallet.", format_toman(amount_rial))
}

pub fn deposit_rejected(amount_rial: i64) -> String {
    format!(
        "Your deposit of {} was rejected. Contact support if this looks wrong.",
        format_toman(amount_rial)
    )
}

pub fn expiry_reminder(server_title: &str, remaining_days: i64, remaining_gb: f64) -> String {
    format!(
        "Your subscription on {} is running low: {} day(s) and {:.1} GB left. Renew to stay connected.",
        server_title, remaining_days, remaining_gb
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_receipt_shows_toman_price_and_link() {
        let msg = purchase_receipt("Gold 30d", "eu-1", 1_200_000, "https://cdn.example.com/u/abc/");
        assert!(msg.contains("Plan: Gold 30d"));
        assert!(msg.contains("Paid: 120,000 Toman"));
        assert!(msg.contains("https://cdn.example.com/u/abc/"));
    }

    #[test]
    fn admin_sale_report_names_buyer_and_server() {
        let msg = admin_sale_report("Gold 30d", "eu-1", 4242, 1_200_000);
        assert_eq!(msg, "New sale: Gold 30d on eu-1 to user 4242 for 120,000 Toman.");
    }

    #[test]
    fn reminder_rounds_usage_to_one_decimal() {
        let msg = expiry_reminder("eu-1", 2, 1.25);
        assert!(msg.contains("2 day(s) and 1.2 GB left"));
    }
}
