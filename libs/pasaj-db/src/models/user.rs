use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub telegram_id: i64,
    pub full_name: String,
    pub username: Option<String>,
    /// Wallet balance in Rials.
    pub balance: i64,
    pub banned: bool,
    pub trial_allowed: bool,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
