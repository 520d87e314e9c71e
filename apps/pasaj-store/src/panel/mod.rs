pub mod hiddify;

pub use hiddify::HiddifyClient;

use anyhow::Result;
use async_trait::async_trait;
use pasaj_db::models::Server;
use uuid::Uuid;

/// What a provisioning call pushes to the panel when creating a subscription.
#[derive(Debug, Clone)]
pub struct NewRemoteUser {
    pub name: String,
    pub usage_limit_gb: f64,
    pub package_days: i64,
    pub telegram_id: Option<i64>,
    pub comment: Option<String>,
}

/// The panel's record of a subscription, as the admin API reports it.
#[derive(Debug, Clone)]
pub struct RemoteUser {
    pub uuid: Uuid,
    pub name: String,
    pub usage_limit_gb: f64,
    pub current_usage_gb: f64,
    pub package_days: i64,
    pub enabled: bool,
    pub comment: Option<String>,
}

/// Fields a renewal patches on an existing remote user. `None` leaves the
/// field untouched.
#[derive(Debug, Clone, Default)]
pub struct RemoteUserPatch {
    pub usage_limit_gb: Option<f64>,
    pub package_days: Option<i64>,
    pub current_usage_gb: Option<f64>,
    pub comment: Option<String>,
    pub enabled: Option<bool>,
}

/// User-side profile numbers. The panel computes remaining days from its
/// own start-date bookkeeping, so these are authoritative.
#[derive(Debug, Clone, Copy)]
pub struct RemoteProfile {
    pub remaining_days: i64,
    pub current_usage_gb: f64,
    pub usage_limit_gb: f64,
}

/// Everything the store needs from a remote panel. One implementation per
/// panel flavor; tests substitute their own.
#[async_trait]
pub trait PanelClient: Send + Sync {
    /// Creates a remote user and returns the UUID the panel assigned.
    async fn create_user(&self, server: &Server, user: &NewRemoteUser) -> Result<Uuid>;

    async fn get_user(&self, server: &Server, uuid: Uuid) -> Result<Option<RemoteUser>>;

    async fn update_user(
        &self,
        server: &Server,
        uuid: Uuid,
        patch: &RemoteUserPatch,
    ) -> Result<()>;

    async fn delete_user(&self, server: &Server, uuid: Uuid) -> Result<()>;

    /// Every subscription the panel holds, local or not.
    async fn list_users(&self, server: &Server) -> Result<Vec<RemoteUser>>;

    async fn user_profile(&self, server: &Server, uuid: Uuid) -> Result<Option<RemoteProfile>>;

    /// Liveness probe against the panel's unauthenticated ping endpoint.
    async fn ping(&self, server: &Server) -> Result<()>;

    /// Panel-side system report, passed through as-is for the admin view.
    async fn server_status(&self, server: &Server) -> Result<serde_json::Value>;

    /// Asks the panel to refresh its usage accounting.
    async fn sync_usage(&self, server: &Server) -> Result<()>;
}
