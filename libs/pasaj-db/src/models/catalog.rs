use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Server {
    pub id: i64,
    pub title: String,
    /// Panel base URL including the proxy path (API roots hang off this).
    pub panel_url: String,
    pub api_key: String,
    /// Client-facing base for subscription links. Falls back to panel_url.
    pub client_url: Option<String>,
    pub user_limit: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Server {
    pub fn client_base(&self) -> &str {
        self.client_url.as_deref().unwrap_or(&self.panel_url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub size_gb: f64,
    pub days: i32,
    /// Price in Rials.
    pub price: i64,
    pub server_id: i64,
    pub active: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A server joined with its current local subscriber count (orders + trials).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServerLoad {
    pub id: i64,
    pub title: String,
    pub panel_url: String,
    pub api_key: String,
    pub client_url: Option<String>,
    pub user_limit: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub subscribers: i64,
}

impl ServerLoad {
    pub fn into_server(self) -> Server {
        Server {
            id: self.id,
            title: self.title,
            panel_url: self.panel_url,
            api_key: self.api_key,
            client_url: self.client_url,
            user_limit: self.user_limit,
            active: self.active,
            created_at: self.created_at,
        }
    }
}
