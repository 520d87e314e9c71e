use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Order>> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch order by ID")
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE uuid = $1")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch order by UUID")
    }

    pub async fn get_for_user(&self, telegram_id: i64) -> Result<Vec<Order>> {
        sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE telegram_id = $1 ORDER BY created_at DESC",
        )
        .bind(telegram_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch orders for user")
    }

    pub async fn get_active(&self) -> Result<Vec<Order>> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE status = 'active' ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch active orders")
    }

    pub async fn update_status(&self, id: i64, status: &str) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update order status")?;
        Ok(())
    }

    /// Re-point an order at the plan it was renewed onto.
    pub async fn record_renewal(&self, id: i64, plan_id: i64, price: i64) -> Result<()> {
        sqlx::query("UPDATE orders SET plan_id = $1, price = $2, status = 'active' WHERE id = $3")
            .bind(plan_id)
            .bind(price)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to record order renewal")?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete order")?;
        Ok(())
    }
}
