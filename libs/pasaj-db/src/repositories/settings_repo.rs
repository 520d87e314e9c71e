use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::StoreSettings;

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One bulk read into the typed settings struct. Callers load fresh per
    /// decision instead of caching across requests.
    pub async fn load(&self) -> Result<StoreSettings> {
        let rows = self.all_raw().await?;
        Ok(StoreSettings::from_rows(&rows))
    }

    pub async fn all_raw(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch settings")?;
        Ok(rows.into_iter().collect())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch setting")
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("Failed to update setting")?;
        Ok(())
    }
}
