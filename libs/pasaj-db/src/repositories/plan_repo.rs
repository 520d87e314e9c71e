use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::Plan;

#[derive(Debug, Clone)]
pub struct PlanRepository {
    pool: PgPool,
}

impl PlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Plan>> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch plan")
    }

    pub async fn get_all(&self) -> Result<Vec<Plan>> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans ORDER BY server_id, price")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch plans")
    }

    pub async fn get_active_for_server(&self, server_id: i64) -> Result<Vec<Plan>> {
        sqlx::query_as::<_, Plan>(
            "SELECT * FROM plans WHERE server_id = $1 AND active = TRUE ORDER BY price",
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch active plans for server")
    }

    pub async fn create(
        &self,
        name: &str,
        size_gb: f64,
        days: i32,
        price: i64,
        server_id: i64,
        description: Option<&str>,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO plans (name, size_gb, days, price, server_id, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(size_gb)
        .bind(days)
        .bind(price)
        .bind(server_id)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create plan")
    }

    pub async fn update(
        &self,
        id: i64,
        name: &str,
        size_gb: f64,
        days: i32,
        price: i64,
        description: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE plans
            SET name = $1, size_gb = $2, days = $3, price = $4, description = $5
            WHERE id = $6
            "#,
        )
        .bind(name)
        .bind(size_gb)
        .bind(days)
        .bind(price)
        .bind(description)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update plan")?;
        Ok(())
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE plans SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update plan active flag")?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete plan")?;
        Ok(())
    }
}
