use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::User;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, telegram_id: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE telegram_id = $1")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")
    }

    pub async fn exists(&self, telegram_id: i64) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i32>("SELECT 1 FROM users WHERE telegram_id = $1")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to check user existence")?;
        Ok(found.is_some())
    }

    /// Created on first contact; later contacts refresh the profile fields.
    pub async fn upsert(
        &self,
        telegram_id: i64,
        full_name: &str,
        username: Option<&str>,
    ) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (telegram_id, full_name, username)
            VALUES ($1, $2, $3)
            ON CONFLICT (telegram_id) DO UPDATE SET
                full_name = excluded.full_name,
                username = COALESCE(excluded.username, users.username)
            RETURNING *
            "#,
        )
        .bind(telegram_id)
        .bind(full_name)
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert user")
    }

    pub async fn get_all(&self) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch all users")
    }

    pub async fn search(&self, query: &str) -> Result<Vec<User>> {
        let pattern = format!("%{}%", query);
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username ILIKE $1 OR full_name ILIKE $1 ORDER BY created_at DESC",
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search users")
    }

    pub async fn set_banned(&self, telegram_id: i64, banned: bool) -> Result<()> {
        sqlx::query("UPDATE users SET banned = $1 WHERE telegram_id = $2")
            .bind(banned)
            .bind(telegram_id)
            .execute(&self.pool)
            .await
            .context("Failed to update ban flag")?;
        Ok(())
    }

    pub async fn set_trial_allowed(&self, telegram_id: i64, allowed: bool) -> Result<()> {
        sqlx::query("UPDATE users SET trial_allowed = $1 WHERE telegram_id = $2")
            .bind(allowed)
            .bind(telegram_id)
            .execute(&self.pool)
            .await
            .context("Failed to update trial eligibility")?;
        Ok(())
    }

    pub async fn set_comment(&self, telegram_id: i64, comment: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE users SET comment = $1 WHERE telegram_id = $2")
            .bind(comment)
            .bind(telegram_id)
            .execute(&self.pool)
            .await
            .context("Failed to update user comment")?;
        Ok(())
    }

    /// Unconditional balance adjustment (admin corrections, refunds).
    /// Debits that must not overdraw go through the wallet service instead.
    pub async fn adjust_balance(&self, telegram_id: i64, delta: i64) -> Result<()> {
        sqlx::query("UPDATE users SET balance = balance + $1 WHERE telegram_id = $2")
            .bind(delta)
            .bind(telegram_id)
            .execute(&self.pool)
            .await
            .context("Failed to adjust user balance")?;
        Ok(())
    }

    pub async fn delete(&self, telegram_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE telegram_id = $1")
            .bind(telegram_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        Ok(())
    }
}
