use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    /// "percentage" (value is 0-100) or "fixed" (value in Rials).
    pub discount_type: String,
    pub value: i64,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    /// Date-only expiry: the coupon stays valid through 23:59:59 of this day.
    pub expires_at: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_percentage(&self) -> bool {
        self.discount_type == "percentage"
    }

    /// Payable amount after the discount, always within [0, amount].
    pub fn apply_discount(&self, amount: i64) -> i64 {
        if amount <= 0 {
            return 0;
        }
        if self.is_percentage() {
            let off = amount * self.value / 100;
            (amount - off).clamp(0, amount)
        } else {
            amount - self.value.clamp(0, amount)
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.usage_limit, Some(limit) if self.used_count >= limit)
    }

    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        matches!(self.expires_at, Some(day) if day < today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(discount_type: &str, value: i64) -> Coupon {
        Coupon {
            id: 1,
            code: "WELCOME25".to_string(),
            discount_type: discount_type.to_string(),
            value,
            usage_limit: None,
            used_count: 0,
            expires_at: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_discount_rounds_down_in_the_buyers_favor() {
        assert_eq!(coupon("percentage", 30).apply_discount(100_000), 70_000);
        // 25% of 999 Rials is 249.75; the discount keeps the whole 249.
        assert_eq!(coupon("percentage", 25).apply_discount(999), 750);
        assert_eq!(coupon("percentage", 100).apply_discount(50_000), 0);
    }

    #[test]
    fn fixed_discount_never_drops_the_price_below_zero() {
        assert_eq!(coupon("fixed", 50_000).apply_discount(120_000), 70_000);
        assert_eq!(coupon("fixed", 50_000).apply_discount(30_000), 0);
        assert_eq!(coupon("fixed", 30_000).apply_discount(30_000), 0);
    }

    #[test]
    fn out_of_range_values_still_yield_a_price_within_bounds() {
        let price = coupon("percentage", 250).apply_discount(100_000);
        assert!((0..=100_000).contains(&price));
        let price = coupon("fixed", -500).apply_discount(100_000);
        assert!((0..=100_000).contains(&price));
        assert_eq!(coupon("fixed", 500).apply_discount(-100), 0);
        assert_eq!(coupon("percentage", 10).apply_discount(0), 0);
    }

    #[test]
    fn usage_limit_and_expiry_helpers() {
        let mut c = coupon("fixed", 1_000);
        assert!(!c.is_exhausted());
        c.usage_limit = Some(3);
        c.used_count = 3;
        assert!(c.is_exhausted());

        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        c.expires_at = Some(today);
        // Valid through the whole expiry day.
        assert!(!c.is_expired_on(today));
        assert!(c.is_expired_on(today.succ_opt().unwrap()));
    }
}
