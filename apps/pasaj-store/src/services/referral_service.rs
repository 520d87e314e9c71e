use anyhow::{Context, Result};
use sqlx::PgPool;
use thiserror::Error;

use pasaj_db::repositories::{ReferralRepository, ReferralStats, UserRepository};

/// Commission percentage used when the configured rate is missing or
/// outside 0-100.
pub const DEFAULT_COMMISSION_RATE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReferralError {
    #[error("users cannot refer themselves")]
    SelfReferral,
    #[error("referrer is not registered")]
    UnknownReferrer,
    #[error("referred user is not registered")]
    UnknownReferred,
}

/// Whether `register` wrote a new edge or found it already recorded.
/// Both are success: replaying a referral link must not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    AlreadyRegistered,
}

/// Commission owed to a referrer on a referred user's purchase, rounded
/// down. An out-of-range rate falls back to the default instead of
/// producing negative or inflated payouts.
pub fn commission(order_amount: i64, rate: i64) -> i64 {
    let rate = if (0..=100).contains(&rate) {
        rate
    } else {
        DEFAULT_COMMISSION_RATE
    };
    order_amount * rate / 100
}

pub fn referral_link(bot_username: &str, telegram_id: i64) -> String {
    format!("https://t.me/{bot_username}?start=ref_{telegram_id}")
}

/// Extracts the referrer id from a /start payload, if it carries one.
pub fn parse_start_payload(payload: &str) -> Option<i64> {
    payload.trim().strip_prefix("ref_")?.parse().ok()
}

#[derive(Debug, Clone)]
pub struct ReferralService {
    pool: PgPool,
    users: UserRepository,
    referrals: ReferralRepository,
}

impl ReferralService {
    pub fn new(pool: PgPool) -> Self {
        let users = UserRepository::new(pool.clone());
        let referrals = ReferralRepository::new(pool.clone());
        Self {
            pool,
            users,
            referrals,
        }
    }

    /// Records that `referrer_id` brought in `referred_id`. The self-check
    /// runs before anything touches the database.
    pub async fn register(
        &self,
        referrer_id: i64,
        referred_id: i64,
    ) -> Result<Result<Registration, ReferralError>> {
        if referrer_id == referred_id {
            return Ok(Err(ReferralError::SelfReferral));
        }
        if !self.users.exists(referrer_id).await? {
            return Ok(Err(ReferralError::UnknownReferrer));
        }
        if !self.users.exists(referred_id).await? {
            return Ok(Err(ReferralError::UnknownReferred));
        }

        let created = self.referrals.create_if_absent(referrer_id, referred_id).await?;
        Ok(Ok(if created {
            Registration::Created
        } else {
            Registration::AlreadyRegistered
        }))
    }

    /// Credits the referrer's wallet for a referred user's purchase and
    /// bumps the edge's lifetime commission in the same transaction, so the
    /// ledger never disagrees with the balance. Returns the referrer and
    /// the credited amount when an edge exists.
    pub async fn apply_commission(
        &self,
        buyer_id: i64,
        order_amount: i64,
        rate: i64,
    ) -> Result<Option<(i64, i64)>> {
        let Some(edge) = self.referrals.get_for_referred(buyer_id).await? else {
            return Ok(None);
        };

        let amount = commission(order_amount, rate);
        if amount <= 0 {
            return Ok(None);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open commission transaction")?;

        sqlx::query("UPDATE users SET balance = balance + $1 WHERE telegram_id = $2")
            .bind(amount)
            .bind(edge.referrer_id)
            .execute(&mut *tx)
            .await
            .context("Failed to credit referrer balance")?;

        sqlx::query("UPDATE referrals SET commission = commission + $1 WHERE id = $2")
            .bind(amount)
            .bind(edge.id)
            .execute(&mut *tx)
            .await
            .context("Failed to record commission on referral")?;

        tx.commit().await.context("Failed to commit commission")?;

        tracing::info!(
            "Credited {} Rials commission to {} for buyer {}",
            amount,
            edge.referrer_id,
            buyer_id
        );
        Ok(Some((edge.referrer_id, amount)))
    }

    pub async fn stats(&self, referrer_id: i64) -> Result<ReferralStats> {
        self.referrals.stats_for_referrer(referrer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn commission_rounds_down_and_honors_the_rate() {
        assert_eq!(commission(100_000, 10), 10_000);
        assert_eq!(commission(999, 10), 99);
        assert_eq!(commission(100_000, 0), 0);
        assert_eq!(commission(100_000, 100), 100_000);
    }

    #[test]
    fn out_of_range_rates_fall_back_to_the_default() {
        assert_eq!(commission(100_000, 150), 10_000);
        assert_eq!(commission(100_000, -5), 10_000);
    }

    #[test]
    fn links_round_trip_through_the_start_payload() {
        let link = referral_link("pasaj_store_bot", 4242);
        assert_eq!(link, "https://t.me/pasaj_store_bot?start=ref_4242");

        let payload = link.rsplit("start=").next().unwrap();
        assert_eq!(parse_start_payload(payload), Some(4242));
    }

    #[test]
    fn junk_start_payloads_parse_to_none() {
        assert_eq!(parse_start_payload(""), None);
        assert_eq!(parse_start_payload("ref_"), None);
        assert_eq!(parse_start_payload("ref_abc"), None);
        assert_eq!(parse_start_payload("promo_42"), None);
    }

    #[tokio::test]
    async fn self_referral_is_rejected_before_touching_the_database() {
        // A lazy pool never connects; reaching the database would error.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap();
        let service = ReferralService::new(pool);

        let outcome = service.register(7, 7).await.unwrap();
        assert_eq!(outcome, Err(ReferralError::SelfReferral));
    }
}
