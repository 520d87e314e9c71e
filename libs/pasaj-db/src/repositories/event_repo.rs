use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::Event;

#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log(&self, telegram_id: Option<i64>, kind: &str, detail: &str) -> Result<()> {
        sqlx::query("INSERT INTO events (telegram_id, kind, detail) VALUES ($1, $2, $3)")
            .bind(telegram_id)
            .bind(kind)
            .bind(detail)
            .execute(&self.pool)
            .await
            .context("Failed to log event")?;
        Ok(())
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<Event>> {
        sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch recent events")
    }

    pub async fn recent_for_user(&self, telegram_id: i64, limit: i64) -> Result<Vec<Event>> {
        sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE telegram_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(telegram_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch events for user")
    }
}
