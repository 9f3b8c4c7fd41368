//! Keystone API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod auth;
mod dto;
mod error;
mod extract;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::Router;
use keystone_core::AppError;
use keystone_infrastructure::InMemoryRbacRepository;
use tracing::info;

use crate::api_config::{ApiConfig, Command, StoreConfig};
use crate::api_services::{
    RepositorySet, build_app_state, build_memory_session_layer, build_postgres_session_layer,
    connect_and_migrate,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    api_config::init_tracing();

    let config = ApiConfig::load()?;

    match config.command {
        Command::Migrate => migrate(&config).await,
        Command::Seed => seed(&config).await,
        Command::Serve => serve(&config).await,
    }
}

async fn migrate(config: &ApiConfig) -> Result<(), AppError> {
    let StoreConfig::Postgres { database_url } = &config.store else {
        return Err(AppError::Internal(
            "migrate requires KEYSTONE_STORE=postgres".to_owned(),
        ));
    };

    connect_and_migrate(database_url).await?;
    info!("migrations completed");
    Ok(())
}

async fn seed(config: &ApiConfig) -> Result<(), AppError> {
    let StoreConfig::Postgres { database_url } = &config.store else {
        return Err(AppError::Internal(
            "seed requires KEYSTONE_STORE=postgres".to_owned(),
        ));
    };

    let account = config.bootstrap.account()?;
    let pool = connect_and_migrate(database_url).await?;
    let summary = RepositorySet::postgres(pool)
        .bootstrap_service()
        .seed(&account)
        .await?;

    info!(
        permissions_created = summary.permissions_created,
        roles_created = summary.roles_created,
        user_created = summary.user_created,
        username = %account.username,
        "rbac defaults seeded"
    );
    Ok(())
}

async fn serve(config: &ApiConfig) -> Result<(), AppError> {
    let app = match &config.store {
        StoreConfig::Postgres { database_url } => {
            let pool = connect_and_migrate(database_url).await?;
            let repositories = RepositorySet::postgres(pool.clone());
            let session_layer = build_postgres_session_layer(
                pool,
                config.cookie_secure,
                config.session_ttl_minutes,
            )
            .await?;

            api_router::build_router(
                build_app_state(&repositories, config.frontend_url.clone()),
                session_layer,
            )?
        }
        StoreConfig::Memory => {
            // Nothing persists here, so the bootstrap account is seeded on every start.
            let repositories =
                RepositorySet::in_memory(Arc::new(InMemoryRbacRepository::new()));
            let account = config.bootstrap.account()?;
            repositories.bootstrap_service().seed(&account).await?;
            info!(username = %account.username, "in-memory store seeded");

            api_router::build_router(
                build_app_state(&repositories, config.frontend_url.clone()),
                build_memory_session_layer(config.cookie_secure, config.session_ttl_minutes),
            )?
        }
    };

    listen(config, app).await
}

async fn listen(config: &ApiConfig, app: Router) -> Result<(), AppError> {
    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind API listener: {error}")))?;

    info!(%address, "keystone-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("API server error: {error}")))
}
