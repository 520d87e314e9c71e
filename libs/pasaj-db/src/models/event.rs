use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Audit trail row. Written best-effort; never load-bearing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub telegram_id: Option<i64>,
    pub kind: String,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}
