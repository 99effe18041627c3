use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tokio::signal;

mod config;
mod db;
mod api_error;
mod telemetry;
mod middleware;
mod http;
mod models;
mod service;
mod store;

use crate::config::{Config, StoreBackend};
use crate::db::{create_pool, run_migrations};
use crate::telemetry::init_telemetry;
use crate::middleware::cors_middleware;
use crate::service::RemoteConfigService;
use crate::store::{ConfigStore, InMemoryConfigStore, PgConfigStore};

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn ConfigStore>> {
    match (config.store.backend, &config.store.database) {
        (StoreBackend::Postgres, Some(database)) => {
            let pool = create_pool(database)
                .await
                .context("Failed to create database pool")?;
            run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            Ok(Arc::new(PgConfigStore::new(pool)))
        }
        (StoreBackend::Postgres, None) => {
            anyhow::bail!("Postgres store selected without database settings")
        }
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory config store; data will not survive a restart");
            Ok(Arc::new(InMemoryConfigStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize telemetry
    init_telemetry(&config.server.rust_log);

    let store = build_store(&config).await?;
    let config_service = web::Data::new(RemoteConfigService::new(store));

    tracing::info!(
        "Starting BlendBerry backend server on {}:{} ({:?} store)",
        config.server.host,
        config.server.port,
        config.store.backend
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(config_service.clone())
            .wrap(cors_middleware())
            .wrap(actix_web::middleware::Logger::default())
            .route("/api/health", web::get().to(crate::http::health::health_check))
            .configure(crate::http::config_handler::configure_routes)
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run();

    // Graceful shutdown
    let server_handle = server.handle();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await?;
    Ok(())
}
