use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::Coupon;

#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: PgPool,
}

impl CouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Coupon>> {
        sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch coupon by ID")
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch coupon by code")
    }

    pub async fn get_all(&self) -> Result<Vec<Coupon>> {
        sqlx::query_as::<_, Coupon>("SELECT * FROM coupons ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch coupons")
    }

    pub async fn code_exists(&self, code: &str) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i32>("SELECT 1 FROM coupons WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to check coupon code")?;
        Ok(found.is_some())
    }

    pub async fn create(
        &self,
        code: &str,
        discount_type: &str,
        value: i64,
        usage_limit: Option<i64>,
        expires_at: Option<NaiveDate>,
    ) -> Result<Coupon> {
        sqlx::query_as::<_, Coupon>(
            r#"
            INSERT INTO coupons (code, discount_type, value, usage_limit, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(discount_type)
        .bind(value)
        .bind(usage_limit)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create coupon")
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE coupons SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update coupon active flag")?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete coupon")?;
        Ok(())
    }
}
