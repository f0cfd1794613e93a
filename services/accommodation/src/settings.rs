//! Process-local snapshot of the portal settings
//!
//! Reads are served from the snapshot until it is older than the refresh
//! interval. Updates made through this process refresh it immediately;
//! updates made elsewhere show up within one interval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::AccommodationResult;
use crate::models::{PortalSettings, UpdateSettings};
use crate::repositories::SettingsStore;

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    settings: PortalSettings,
    loaded_at: Instant,
}

/// Cached settings with a bounded staleness
#[derive(Clone)]
pub struct SettingsCache {
    store: Arc<dyn SettingsStore>,
    refresh: Duration,
    snapshot: Arc<RwLock<Option<Snapshot>>>,
}

impl SettingsCache {
    pub fn new(store: Arc<dyn SettingsStore>, refresh: Duration) -> Self {
        Self {
            store,
            refresh,
            snapshot: Arc::new(RwLock::new(None)),
        }
    }

    /// Current settings, reloading when the snapshot is stale
    pub async fn current(&self) -> AccommodationResult<PortalSettings> {
        if let Some(snapshot) = *self.snapshot.read().await {
            if snapshot.loaded_at.elapsed() < self.refresh {
                return Ok(snapshot.settings);
            }
        }

        let settings = self.store.load().await?;
        *self.snapshot.write().await = Some(Snapshot {
            settings,
            loaded_at: Instant::now(),
        });
        debug!(?settings, "Portal settings reloaded");
        Ok(settings)
    }

    /// Apply a partial update on top of the stored settings
    pub async fn update(&self, update: &UpdateSettings) -> AccommodationResult<PortalSettings> {
        let mut snapshot = self.snapshot.write().await;

        let settings = self.store.load().await?.apply(update);
        self.store.save(&settings).await?;
        *snapshot = Some(Snapshot {
            settings,
            loaded_at: Instant::now(),
        });

        info!(?settings, "Portal settings updated");
        Ok(settings)
    }
}
