//! Application state shared across handlers

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::middleware::AccessPolicy;
use crate::repositories::{
    MemoryStore, PropertyRepository, RequestRepository, SettingsRepository, UserRepository,
};
use crate::service::AccommodationService;
use crate::settings::SettingsCache;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Present only for the PostgreSQL backend
    pub db_pool: Option<PgPool>,
    pub service: AccommodationService,
    pub access: AccessPolicy,
}

impl AppState {
    /// State backed by PostgreSQL repositories
    pub fn postgres(pool: PgPool, config: &AppConfig) -> Self {
        let settings = SettingsCache::new(
            Arc::new(SettingsRepository::new(pool.clone())),
            config.settings.refresh_interval(),
        );
        let service = AccommodationService::new(
            Arc::new(PropertyRepository::new(pool.clone())),
            Arc::new(RequestRepository::new(pool.clone())),
            Arc::new(UserRepository::new(pool.clone())),
            settings,
        );

        Self {
            db_pool: Some(pool),
            service,
            access: AccessPolicy::new(&config.auth),
        }
    }

    /// State backed by a single in-process store
    pub fn in_memory(store: MemoryStore, config: &AppConfig) -> Self {
        let store = Arc::new(store);
        let settings = SettingsCache::new(store.clone(), config.settings.refresh_interval());
        let service =
            AccommodationService::new(store.clone(), store.clone(), store, settings);

        Self {
            db_pool: None,
            service,
            access: AccessPolicy::new(&config.auth),
        }
    }
}
