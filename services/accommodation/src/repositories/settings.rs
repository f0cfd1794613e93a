//! Settings repository over the key/value `settings` table

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::error::AccommodationResult;
use crate::models::PortalSettings;
use crate::repositories::SettingsStore;

/// Settings repository
#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    /// Create a new settings repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn load(&self) -> AccommodationResult<PortalSettings> {
        let pairs: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;

        Ok(PortalSettings::from_pairs(pairs))
    }

    async fn save(&self, settings: &PortalSettings) -> AccommodationResult<()> {
        let mut tx = self.pool.begin().await?;

        for (key, value) in settings.to_pairs() {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(?settings, "Portal settings saved");
        Ok(())
    }
}
