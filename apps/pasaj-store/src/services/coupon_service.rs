use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use pasaj_db::models::Coupon;
use pasaj_db::repositories::CouponRepository;

const CODE_LENGTH: usize = 8;
const CODE_ATTEMPTS: usize = 5;

/// Letters and digits minus the glyphs people misread: 0/O and 1/I/l.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";

/// Why a coupon cannot be applied. Checks run in this order and the first
/// failure wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon code not found")]
    NotFound,
    #[error("coupon is disabled")]
    Inactive,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon usage limit reached")]
    Exhausted,
    #[error("coupon already used by this account")]
    AlreadyUsed,
}

#[derive(Debug, Clone)]
pub struct CouponService {
    pool: PgPool,
    coupons: CouponRepository,
}

fn check(coupon: &Coupon, already_used: bool, today: NaiveDate) -> Result<(), CouponRejection> {
    if !coupon.active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.is_expired_on(today) {
        return Err(CouponRejection::Expired);
    }
    if coupon.is_exhausted() {
        return Err(CouponRejection::Exhausted);
    }
    if already_used {
        return Err(CouponRejection::AlreadyUsed);
    }
    Ok(())
}

fn random_code() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

impl CouponService {
    pub fn new(pool: PgPool) -> Self {
        let coupons = CouponRepository::new(pool.clone());
        Self { pool, coupons }
    }

    /// Checks whether `code` can be applied by this buyer right now. The
    /// answer is advisory: the buyer may sit on the quote, so `consume`
    /// re-checks everything under a row lock at purchase time.
    pub async fn validate(
        &self,
        code: &str,
        telegram_id: i64,
    ) -> Result<Result<Coupon, CouponRejection>> {
        let Some(coupon) = self.coupons.get_by_code(code).await? else {
            return Ok(Err(CouponRejection::NotFound));
        };
        let already_used = self.usage_exists(coupon.id, telegram_id).await?;
        Ok(check(&coupon, already_used, Utc::now().date_naive()).map(|()| coupon))
    }

    /// Marks the coupon used inside the caller's transaction. The row lock
    /// makes the limit check and the counter bump see the same state even
    /// when two buyers race for the last slot; the unique usage row turns
    /// a same-buyer race into an `AlreadyUsed` rejection.
    pub async fn consume(
        tx: &mut Transaction<'_, Postgres>,
        coupon_id: i64,
        telegram_id: i64,
    ) -> Result<Result<(), CouponRejection>> {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = $1 FOR UPDATE")
            .bind(coupon_id)
            .fetch_optional(&mut **tx)
            .await
            .context("Failed to lock coupon row")?;

        let Some(coupon) = coupon else {
            return Ok(Err(CouponRejection::NotFound));
        };
        if let Err(rejection) = check(&coupon, false, Utc::now().date_naive()) {
            return Ok(Err(rejection));
        }

        let inserted = sqlx::query(
            "INSERT INTO coupon_usages (coupon_id, telegram_id) VALUES ($1, $2)
             ON CONFLICT (coupon_id, telegram_id) DO NOTHING",
        )
        .bind(coupon_id)
        .bind(telegram_id)
        .execute(&mut **tx)
        .await
        .context("Failed to record coupon usage")?
        .rows_affected();

        if inserted == 0 {
            return Ok(Err(CouponRejection::AlreadyUsed));
        }

        sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE id = $1")
            .bind(coupon_id)
            .execute(&mut **tx)
            .await
            .context("Failed to bump coupon usage count")?;

        Ok(Ok(()))
    }

    /// Creates a coupon, generating a code when none is given.
    pub async fn create(
        &self,
        code: Option<&str>,
        discount_type: &str,
        value: i64,
        usage_limit: Option<i64>,
        expires_at: Option<NaiveDate>,
    ) -> Result<Coupon> {
        anyhow::ensure!(
            matches!(discount_type, "percentage" | "fixed"),
            "Unknown discount type: {discount_type}"
        );
        if discount_type == "percentage" {
            anyhow::ensure!((0..=100).contains(&value), "Percentage must be within 0-100");
        } else {
            anyhow::ensure!(value >= 0, "Fixed discount cannot be negative");
        }

        let code = match code {
            Some(c) => c.trim().to_string(),
            None => self.generate_code().await?,
        };
        self.coupons
            .create(&code, discount_type, value, usage_limit, expires_at)
            .await
    }

    pub async fn generate_code(&self) -> Result<String> {
        for _ in 0..CODE_ATTEMPTS {
            let code = random_code();
            if !self.coupons.code_exists(&code).await? {
                return Ok(code);
            }
        }
        anyhow::bail!("Could not find an unused coupon code in {CODE_ATTEMPTS} attempts")
    }

    async fn usage_exists(&self, coupon_id: i64, telegram_id: i64) -> Result<bool> {
        let row: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM coupon_usages WHERE coupon_id = $1 AND telegram_id = $2",
        )
        .bind(coupon_id)
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to check coupon usage")?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon() -> Coupon {
        Coupon {
            id: 1,
            code: "SUMMER25".to_string(),
            discount_type: "percentage".to_string(),
            value: 25,
            usage_limit: Some(10),
            used_count: 0,
            expires_at: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn first_failing_check_wins() {
        let today = Utc::now().date_naive();

        let mut c = coupon();
        c.active = false;
        c.expires_at = Some(today - Duration::days(1));
        c.used_count = 10;
        assert_eq!(check(&c, true, today), Err(CouponRejection::Inactive));

        c.active = true;
        assert_eq!(check(&c, true, today), Err(CouponRejection::Expired));

        c.expires_at = None;
        assert_eq!(check(&c, true, today), Err(CouponRejection::Exhausted));

        c.used_count = 9;
        assert_eq!(check(&c, true, today), Err(CouponRejection::AlreadyUsed));

        assert_eq!(check(&c, false, today), Ok(()));
    }

    #[test]
    fn expiry_day_itself_still_validates() {
        let today = Utc::now().date_naive();
        let mut c = coupon();
        c.expires_at = Some(today);
        assert_eq!(check(&c, false, today), Ok(()));

        c.expires_at = Some(today - Duration::days(1));
        assert_eq!(check(&c, false, today), Err(CouponRejection::Expired));
    }

    #[test]
    fn unlimited_coupons_never_exhaust() {
        let mut c = coupon();
        c.usage_limit = None;
        c.used_count = 1_000_000;
        assert_eq!(check(&c, false, Utc::now().date_naive()), Ok(()));
    }

    #[test]
    fn generated_codes_avoid_lookalike_characters() {
        for _ in 0..200 {
            let code = random_code();
            assert_eq!(code.len(), CODE_LENGTH);
            for ch in code.chars() {
                assert!(CODE_ALPHABET.contains(&(ch as u8)));
                assert!(!"0O1Il".contains(ch), "ambiguous glyph {ch} in {code}");
            }
        }
    }
}
