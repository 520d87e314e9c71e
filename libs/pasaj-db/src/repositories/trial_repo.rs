use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::Trial;

#[derive(Debug, Clone)]
pub struct TrialRepository {
    pool: PgPool,
}

impl TrialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_for_user(&self, telegram_id: i64) -> Result<Option<Trial>> {
        sqlx::query_as::<_, Trial>("SELECT * FROM trials WHERE telegram_id = $1")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch trial for user")
    }

    pub async fn get_all(&self) -> Result<Vec<Trial>> {
        sqlx::query_as::<_, Trial>("SELECT * FROM trials ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch trials")
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM trials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete trial")?;
        Ok(())
    }
}
