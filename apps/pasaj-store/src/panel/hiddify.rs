use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pasaj_db::models::Server;

use super::{NewRemoteUser, PanelClient, RemoteProfile, RemoteUser, RemoteUserPatch};

const API_KEY_HEADER: &str = "Hiddify-API-Key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for Hiddify manager panels. One instance serves every
/// configured server; the target's base URL and API key come from the
/// server row on each call.
#[derive(Debug, Clone)]
pub struct HiddifyClient {
    client: Client,
}

#[derive(Debug, Serialize)]
struct CreateUserBody<'a> {
    name: &'a str,
    #[serde(rename = "usage_limit_GB")]
    usage_limit_gb: f64,
    package_days: i64,
    mode: &'a str,
    lang: &'a str,
    enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    telegram_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct PatchUserBody<'a> {
    #[serde(rename = "usage_limit_GB", skip_serializing_if = "Option::is_none")]
    usage_limit_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    package_days: Option<i64>,
    #[serde(rename = "current_usage_GB", skip_serializing_if = "Option::is_none")]
    current_usage_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    uuid: Uuid,
    #[serde(default)]
    name: String,
    #[serde(rename = "usage_limit_GB", default)]
    usage_limit_gb: f64,
    #[serde(rename = "current_usage_GB", default)]
    current_usage_gb: f64,
    #[serde(default)]
    package_days: i64,
    #[serde(default)]
    enable: bool,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileRecord {
    #[serde(default)]
    profile_remaining_days: i64,
    #[serde(default)]
    profile_usage_current: f64,
    #[serde(default)]
    profile_usage_total: f64,
}

impl From<UserRecord> for RemoteUser {
    fn from(raw: UserRecord) -> Self {
        Self {
            uuid: raw.uuid,
            name: raw.name,
            usage_limit_gb: raw.usage_limit_gb,
            current_usage_gb: raw.current_usage_gb,
            package_days: raw.package_days,
            enabled: raw.enable,
            comment: raw.comment,
        }
    }
}

impl HiddifyClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build panel HTTP client")?;
        Ok(Self { client })
    }

    /// Admin API root. The server's panel URL already carries the proxy
    /// path Hiddify hides behind.
    fn admin_url(server: &Server, path: &str) -> String {
        format!("{}/api/v2/admin{}", server.panel_url.trim_end_matches('/'), path)
    }

    fn panel_url(server: &Server, path: &str) -> String {
        format!("{}{}", server.panel_url.trim_end_matches('/'), path)
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Panel returned {status} while {what}");
        }
        Ok(resp)
    }
}

#[async_trait]
impl PanelClient for HiddifyClient {
    async fn create_user(&self, server: &Server, user: &NewRemoteUser) -> Result<Uuid> {
        let body = CreateUserBody {
            name: &user.name,
            usage_limit_gb: user.usage_limit_gb,
            package_days: user.package_days,
            mode: "no_reset",
            lang: "en",
            enable: true,
            telegram_id: user.telegram_id,
            comment: user.comment.as_deref(),
        };

        let resp = self
            .client
            .post(Self::admin_url(server, "/user/"))
            .header(API_KEY_HEADER, &server.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Panel request to server {} failed", server.id))?;

        let created: UserRecord = Self::check(resp, "creating a user")
            .await?
            .json()
            .await
            .context("Panel returned an unreadable user record")?;

        Ok(created.uuid)
    }

    async fn get_user(&self, server: &Server, uuid: Uuid) -> Result<Option<RemoteUser>> {
        let resp = self
            .client
            .get(Self::admin_url(server, &format!("/user/{uuid}/")))
            .header(API_KEY_HEADER, &server.api_key)
            .send()
            .await
            .with_context(|| format!("Panel request to server {} failed", server.id))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let raw: UserRecord = Self::check(resp, "fetching a user")
            .await?
            .json()
            .await
            .context("Panel returned an unreadable user record")?;

        Ok(Some(raw.into()))
    }

    async fn update_user(
        &self,
        server: &Server,
        uuid: Uuid,
        patch: &RemoteUserPatch,
    ) -> Result<()> {
        let body = PatchUserBody {
            usage_limit_gb: patch.usage_limit_gb,
            package_days: patch.package_days,
            current_usage_gb: patch.current_usage_gb,
            comment: patch.comment.as_deref(),
            enable: patch.enabled,
        };

        let resp = self
            .client
            .patch(Self::admin_url(server, &format!("/user/{uuid}/")))
            .header(API_KEY_HEADER, &server.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Panel request to server {} failed", server.id))?;

        Self::check(resp, "updating a user").await?;
        Ok(())
    }

    async fn delete_user(&self, server: &Server, uuid: Uuid) -> Result<()> {
        let resp = self
            .client
            .delete(Self::admin_url(server, &format!("/user/{uuid}/")))
            .header(API_KEY_HEADER, &server.api_key)
            .send()
            .await
            .with_context(|| format!("Panel request to server {} failed", server.id))?;

        // Deleting an already-gone user is not a failure worth compensating.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Self::check(resp, "deleting a user").await?;
        Ok(())
    }

    async fn list_users(&self, server: &Server) -> Result<Vec<RemoteUser>> {
        let resp = self
            .client
            .get(Self::admin_url(server, "/user/"))
            .header(API_KEY_HEADER, &server.api_key)
            .send()
            .await
            .with_context(|| format!("Panel request to server {} failed", server.id))?;

        let raw: Vec<UserRecord> = Self::check(resp, "listing users")
            .await?
            .json()
            .await
            .context("Panel returned an unreadable user list")?;

        Ok(raw.into_iter().map(Into::into).collect())
    }

    async fn user_profile(&self, server: &Server, uuid: Uuid) -> Result<Option<RemoteProfile>> {
        let resp = self
            .client
            .get(Self::panel_url(server, &format!("/{uuid}/api/v2/user/me/")))
            .header(API_KEY_HEADER, &server.api_key)
            .send()
            .await
            .with_context(|| format!("Panel request to server {} failed", server.id))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let raw: ProfileRecord = Self::check(resp, "fetching a profile")
            .await?
            .json()
            .await
            .context("Panel returned an unreadable profile")?;

        Ok(Some(RemoteProfile {
            remaining_days: raw.profile_remaining_days,
            current_usage_gb: raw.profile_usage_current,
            usage_limit_gb: raw.profile_usage_total,
        }))
    }

    async fn ping(&self, server: &Server) -> Result<()> {
        let resp = self
            .client
            .get(Self::panel_url(server, "/api/v2/panel/ping/"))
            .send()
            .await
            .with_context(|| format!("Panel ping to server {} failed", server.id))?;

        Self::check(resp, "pinging the panel").await?;
        Ok(())
    }

    async fn server_status(&self, server: &Server) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(Self::admin_url(server, "/server_status/"))
            .header(API_KEY_HEADER, &server.api_key)
            .send()
            .await
            .with_context(|| format!("Panel request to server {} failed", server.id))?;

        Self::check(resp, "reading server status")
            .await?
            .json()
            .await
            .context("Panel returned an unreadable status report")
    }

    async fn sync_usage(&self, server: &Server) -> Result<()> {
        let resp = self
            .client
            .get(Self::admin_url(server, "/update_user_usage/"))
            .header(API_KEY_HEADER, &server.api_key)
            .send()
            .await
            .with_context(|| format!("Panel request to server {} failed", server.id))?;

        Self::check(resp, "syncing usage").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn server(panel_url: &str) -> Server {
        Server {
            id: 1,
            title: "eu-1".to_string(),
            panel_url: panel_url.to_string(),
            api_key: "secret".to_string(),
            client_url: None,
            user_limit: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn admin_urls_nest_under_the_proxy_path() {
        let s = server("https://panel.example.com/g7Hx2");
        assert_eq!(
            HiddifyClient::admin_url(&s, "/user/"),
            "https://panel.example.com/g7Hx2/api/v2/admin/user/"
        );
    }

    #[test]
    fn trailing_slash_on_panel_url_does_not_double_up() {
        let s = server("https://panel.example.com/g7Hx2/");
        assert_eq!(
            HiddifyClient::panel_url(&s, "/api/v2/panel/ping/"),
            "https://panel.example.com/g7Hx2/api/v2/panel/ping/"
        );
    }

    #[test]
    fn create_body_skips_absent_fields() {
        let body = CreateUserBody {
            name: "User_1",
            usage_limit_gb: 30.0,
            package_days: 30,
            mode: "no_reset",
            lang: "en",
            enable: true,
            telegram_id: None,
            comment: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["usage_limit_GB"], 30.0);
        assert!(json.get("telegram_id").is_none());
        assert!(json.get("comment").is_none());
    }
}
