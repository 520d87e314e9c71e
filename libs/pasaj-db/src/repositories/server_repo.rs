use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::{Server, ServerLoad};

#[derive(Debug, Clone)]
pub struct ServerRepository {
    pool: PgPool,
}

impl ServerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Server>> {
        sqlx::query_as::<_, Server>("SELECT * FROM servers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch server")
    }

    pub async fn get_all(&self) -> Result<Vec<Server>> {
        sqlx::query_as::<_, Server>("SELECT * FROM servers ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch servers")
    }

    pub async fn get_active(&self) -> Result<Vec<Server>> {
        sqlx::query_as::<_, Server>("SELECT * FROM servers WHERE active = TRUE ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch active servers")
    }

    /// All servers joined with their local subscriber counts (active orders
    /// plus trials). The count is a local approximation; subscriptions
    /// created outside the store are invisible to it.
    pub async fn get_with_load(&self) -> Result<Vec<ServerLoad>> {
        sqlx::query_as::<_, ServerLoad>(
            r#"
            SELECT s.*, COALESCE(o.cnt, 0) + COALESCE(t.cnt, 0) AS subscribers
            FROM servers s
            LEFT JOIN (
                SELECT server_id, COUNT(*) AS cnt FROM orders
                WHERE status = 'active' GROUP BY server_id
            ) o ON o.server_id = s.id
            LEFT JOIN (SELECT server_id, COUNT(*) AS cnt FROM trials GROUP BY server_id) t
                ON t.server_id = s.id
            ORDER BY s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch servers with load")
    }

    pub async fn create(
        &self,
        title: &str,
        panel_url: &str,
        api_key: &str,
        client_url: Option<&str>,
        user_limit: Option<i64>,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO servers (title, panel_url, api_key, client_url, user_limit)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(panel_url)
        .bind(api_key)
        .bind(client_url)
        .bind(user_limit)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create server")
    }

    pub async fn update(
        &self,
        id: i64,
        title: &str,
        panel_url: &str,
        api_key: &str,
        client_url: Option<&str>,
        user_limit: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE servers
            SET title = $1, panel_url = $2, api_key = $3, client_url = $4, user_limit = $5
            WHERE id = $6
            "#,
        )
        .bind(title)
        .bind(panel_url)
        .bind(api_key)
        .bind(client_url)
        .bind(user_limit)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update server")?;
        Ok(())
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE servers SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update server active flag")?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM servers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete server")?;
        Ok(())
    }
}
