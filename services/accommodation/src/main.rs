use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use accommodation::{
    config::{AppConfig, Backend},
    middleware::JwtVerifier,
    repositories::MemoryStore,
    routes,
    state::AppState,
};
use common::database::{health_check, init_pool, run_migrations};

#[tokio::main]
async fn main() -> Result<()> {
    let env = std::env::var("UTSAV_ENV").unwrap_or_else(|_| "development".to_string());
    let config = AppConfig::load(&env).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(environment = %env, "Starting accommodation service");

    let verifier = JwtVerifier::from_config(&config.auth).context("Failed to load JWT public key")?;

    let state = match config.database.backend {
        Backend::Postgres => {
            let db_config = config.database.database_config()?;
            let pool = init_pool(&db_config).await?;

            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            if config.database.run_migrations {
                run_migrations(&pool).await?;
            }

            AppState::postgres(pool, &config)
        }
        Backend::Memory => {
            warn!("Using the in-memory store; all data is lost on shutdown");
            AppState::in_memory(MemoryStore::new(), &config)
        }
    };

    let app = routes::create_router(state, Arc::new(verifier));

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Accommodation service listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Accommodation service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
