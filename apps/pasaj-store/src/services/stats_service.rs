use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::PgPool;

use pasaj_db::models::ServerLoad;
use pasaj_db::repositories::ServerRepository;

/// Aggregate counters for the admin dashboard.
#[derive(Debug, Clone, Copy, Serialize, sqlx::FromRow)]
pub struct StoreTotals {
    pub total_users: i64,
    pub banned_users: i64,
    pub total_orders: i64,
    pub active_orders: i64,
    pub trials_started: i64,
    pub revenue: i64,
    pub pending_payments: i64,
}

#[derive(Debug, Clone)]
pub struct StatsService {
    pool: PgPool,
    servers: ServerRepository,
}

impl StatsService {
    pub fn new(pool: PgPool) -> Self {
        let servers = ServerRepository::new(pool.clone());
        Self { pool, servers }
    }

    pub async fn totals(&self) -> Result<StoreTotals> {
        sqlx::query_as::<_, StoreTotals>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE banned) AS banned_users,
                (SELECT COUNT(*) FROM orders) AS total_orders,
                (SELECT COUNT(*) FROM orders WHERE status = 'active') AS active_orders,
                (SELECT COUNT(*) FROM trials) AS trials_started,
                (SELECT COALESCE(SUM(price), 0)::BIGINT FROM orders) AS revenue,
                (SELECT COUNT(*) FROM payments WHERE approved IS NULL) AS pending_payments
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute store totals")
    }

    /// Subscriber count per server, the same numbers the balancer scores.
    pub async fn server_loads(&self) -> Result<Vec<ServerLoad>> {
        self.servers.get_with_load().await
    }
}
