use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub telegram_id: i64,
    pub plan_id: i64,
    pub server_id: i64,
    /// The remote panel's identifier for this subscription.
    pub uuid: Uuid,
    /// Price paid at purchase time, in Rials.
    pub price: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trial {
    pub id: i64,
    pub telegram_id: i64,
    pub server_id: i64,
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
}
