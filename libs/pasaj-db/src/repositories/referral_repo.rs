use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::Referral;

#[derive(Debug, Clone)]
pub struct ReferralRepository {
    pool: PgPool,
}

/// Referral totals shown on the affiliate screen.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct ReferralStats {
    pub referred_count: i64,
    pub total_commission: i64,
}

impl ReferralRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Earliest referral edge pointing at this user. When several referrers
    /// claimed the same signup, the first recorded one earns commissions.
    pub async fn get_for_referred(&self, referred_id: i64) -> Result<Option<Referral>> {
        sqlx::query_as::<_, Referral>(
            "SELECT * FROM referrals WHERE referred_id = $1 ORDER BY created_at, id LIMIT 1",
        )
        .bind(referred_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch referral for referred user")
    }

    pub async fn stats_for_referrer(&self, referrer_id: i64) -> Result<ReferralStats> {
        sqlx::query_as::<_, ReferralStats>(
            r#"
            SELECT COUNT(*) AS referred_count,
                   COALESCE(SUM(commission), 0)::BIGINT AS total_commission
            FROM referrals
            WHERE referrer_id = $1
            "#,
        )
        .bind(referrer_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to fetch referral stats")
    }

    /// Records the edge unless it already exists. Returns whether a new row
    /// was written; replaying the same link is not an error.
    pub async fn create_if_absent(&self, referrer_id: i64, referred_id: i64) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO referrals (referrer_id, referred_id)
            VALUES ($1, $2)
            ON CONFLICT (referrer_id, referred_id) DO NOTHING
            "#,
        )
        .bind(referrer_id)
        .bind(referred_id)
        .execute(&self.pool)
        .await
        .context("Failed to create referral")?
        .rows_affected();
        Ok(inserted > 0)
    }
}
