//! Service configuration
//!
//! Layered from `config/default.toml`, an optional `config/{env}.toml`
//! overlay and `UTSAV__SECTION__KEY` environment variables, later sources
//! winning.

use std::time::Duration;

use common::database::DatabaseConfig;
use serde::Deserialize;

/// Root configuration for the accommodation service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Postgres,
    /// Single-process store; state is lost on restart
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,
    /// Falls back to `DATABASE_URL` when unset
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// RS256 public key, either PEM text or a path to a PEM file
    #[serde(default = "default_public_key")]
    pub public_key: String,
    /// Roles allowed to run administrator operations
    #[serde(default = "default_admin_roles")]
    pub admin_roles: Vec<String>,
    /// Roles allowed to view the queue and staff the check-in desk
    #[serde(default = "default_desk_roles")]
    pub desk_roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    /// Maximum age of the cached portal settings
    #[serde(default = "default_refresh_seconds")]
    pub refresh_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl AppConfig {
    /// Load configuration for the given environment name
    pub fn load(env: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("UTSAV")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("auth.admin_roles")
                    .with_list_parse_key("auth.desk_roles"),
            )
            .build()?
            .try_deserialize()
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl StorageConfig {
    /// Pool settings for the shared database layer
    pub fn database_config(&self) -> Result<DatabaseConfig, common::error::DatabaseError> {
        let mut database = DatabaseConfig::from_env()?;
        if let Some(url) = &self.url {
            database.database_url = url.clone();
        }
        database.max_connections = self.max_connections;
        database.min_connections = self.min_connections;
        database.connection_timeout = self.connection_timeout;

        if database.min_connections > database.max_connections {
            return Err(common::error::DatabaseError::Configuration(format!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                database.min_connections, database.max_connections
            )));
        }
        Ok(database)
    }
}

impl SettingsConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            run_migrations: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_key: default_public_key(),
            admin_roles: default_admin_roles(),
            desk_roles: default_desk_roles(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            refresh_seconds: default_refresh_seconds(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3002
}

fn default_backend() -> Backend {
    Backend::Postgres
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_public_key() -> String {
    "keys/jwt_public.pem".to_string()
}

fn default_admin_roles() -> Vec<String> {
    vec!["admin".to_string()]
}

fn default_desk_roles() -> Vec<String> {
    vec!["admin".to_string(), "volunteer".to_string()]
}

fn default_refresh_seconds() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const OVERRIDES: [&str; 4] = [
        "UTSAV__SERVER__PORT",
        "UTSAV__DATABASE__BACKEND",
        "UTSAV__AUTH__DESK_ROLES",
        "UTSAV__SETTINGS__REFRESH_SECONDS",
    ];

    fn clear_overrides() {
        unsafe {
            for key in OVERRIDES {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_files() {
        clear_overrides();

        let config = AppConfig::load("no-such-environment").unwrap();

        assert_eq!(config.server.port, 3002);
        assert_eq!(config.database.backend, Backend::Postgres);
        assert_eq!(config.auth.admin_roles, vec!["admin"]);
        assert_eq!(config.settings.refresh_interval(), Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        unsafe {
            env::set_var("UTSAV__SERVER__PORT", "8088");
            env::set_var("UTSAV__DATABASE__BACKEND", "memory");
            env::set_var("UTSAV__AUTH__DESK_ROLES", "admin,volunteer,desk");
            env::set_var("UTSAV__SETTINGS__REFRESH_SECONDS", "5");
        }

        let config = AppConfig::load("no-such-environment").unwrap();
        clear_overrides();

        assert_eq!(config.bind_address(), "0.0.0.0:8088");
        assert_eq!(config.database.backend, Backend::Memory);
        assert_eq!(config.auth.desk_roles, vec!["admin", "volunteer", "desk"]);
        assert_eq!(config.settings.refresh_seconds, 5);
    }

    #[test]
    #[serial]
    fn test_database_config_prefers_configured_url() {
        unsafe {
            env::set_var("DATABASE_URL", "postgresql://env@localhost/env_db");
        }

        let storage = StorageConfig {
            url: Some("postgresql://cfg@localhost/cfg_db".to_string()),
            max_connections: 4,
            ..StorageConfig::default()
        };
        let database = storage.database_config().unwrap();
        assert_eq!(database.database_url, "postgresql://cfg@localhost/cfg_db");
        assert_eq!(database.max_connections, 4);

        let fallback = StorageConfig::default().database_config().unwrap();
        assert_eq!(fallback.database_url, "postgresql://env@localhost/env_db");

        unsafe {
            env::remove_var("DATABASE_URL");
        }
    }

    #[test]
    #[serial]
    fn test_database_config_rejects_inverted_pool_bounds() {
        let storage = StorageConfig {
            max_connections: 2,
            min_connections: 5,
            ..StorageConfig::default()
        };

        assert!(storage.database_config().is_err());
    }
}
