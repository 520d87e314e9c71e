use anyhow::{Context, Result};

/// Process-level configuration read once at startup. Everything that can
/// change at runtime lives in the settings table instead.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_port: u16,
    /// Shared secret for the /admin routes. Unset means they answer 503.
    pub admin_api_key: Option<String>,
    /// Telegram bot token used for outbound notifications. Absent in
    /// development; notifications then go to the log.
    pub bot_token: Option<String>,
    /// Bot username embedded in referral deep links.
    pub bot_username: String,
    pub admin_chat_ids: Vec<i64>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let listen_port = std::env::var("LISTEN_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);

        let admin_api_key = std::env::var("ADMIN_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let bot_token = std::env::var("BOT_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let bot_username = std::env::var("BOT_USERNAME")
            .unwrap_or_else(|_| "pasaj_store_bot".to_string());

        let admin_chat_ids = std::env::var("ADMIN_CHAT_IDS")
            .map(|raw| parse_id_list(&raw))
            .unwrap_or_default();

        if admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY is not set; admin routes are disabled");
        }
        if admin_chat_ids.is_empty() {
            tracing::warn!("ADMIN_CHAT_IDS is empty; admin notifications are disabled");
        }

        Ok(Self {
            database_url,
            listen_port,
            admin_api_key,
            bot_token,
            bot_username,
            admin_chat_ids,
        })
    }
}

fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_tolerates_spaces_and_junk() {
        assert_eq!(parse_id_list("123, 456 ,789"), vec![123, 456, 789]);
        assert_eq!(parse_id_list("12,abc,,34"), vec![12, 34]);
        assert_eq!(parse_id_list(""), Vec::<i64>::new());
    }
}
