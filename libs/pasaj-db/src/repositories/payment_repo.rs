use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::Payment;

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Payment>> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch payment")
    }

    pub async fn list_pending(&self) -> Result<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE approved IS NULL ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pending payments")
    }

    pub async fn list_for_user(&self, telegram_id: i64) -> Result<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE telegram_id = $1 ORDER BY created_at DESC",
        )
        .bind(telegram_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch payments for user")
    }

    pub async fn create(
        &self,
        telegram_id: i64,
        amount: i64,
        method: &str,
        authority: Option<&str>,
        receipt_path: Option<&str>,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO payments (telegram_id, amount, method, authority, receipt_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(telegram_id)
        .bind(amount)
        .bind(method)
        .bind(authority)
        .bind(receipt_path)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create payment")
    }
}
