//! CLI command implementations.

pub mod migrate;
pub mod seed;

use saleflow_api::config::{ApiConfig, ConfigError};
use saleflow_api::db::{self, RepositoryError};
use saleflow_api::services::pricing::PricingError;
use sqlx::PgPool;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("cannot read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid seed data: {0}")]
    InvalidSeed(String),
}

/// Connect using the same settings as the API server.
async fn connect() -> Result<PgPool, CommandError> {
    let config = ApiConfig::from_env()?;
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&config.database_url, config.database).await?)
}
