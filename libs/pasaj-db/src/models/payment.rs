use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub telegram_id: i64,
    /// Amount in Rials.
    pub amount: i64,
    /// NULL = pending, FALSE = rejected, TRUE = approved.
    pub approved: Option<bool>,
    pub method: String,
    pub authority: Option<String>,
    pub receipt_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn is_pending(&self) -> bool {
        self.approved.is_none()
    }
}
