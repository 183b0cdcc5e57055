//! Database operations for Saleflow `PostgreSQL`.
//!
//! ## Tables (schema `saleflow`)
//!
//! - `store` - Stores and whether they are trading
//! - `price_table` - Versioned, time-bounded prices per (store, barcode)
//! - `session` / `session_item` - Session read model (owned by the session service)
//! - `sale` / `sale_item` - Finalized sales, unique per `session_id`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p saleflow-cli -- migrate
//! ```

pub mod prices;
pub mod sales;
pub mod sessions;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use prices::{NewStore, PriceRepository};
pub use sales::SaleRepository;
pub use sessions::SessionRepository;

use crate::config::DatabaseConfig;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., a second sale for the same session).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}

/// Convert a stored `INTEGER` quantity to the domain's unsigned quantity.
pub(crate) fn stored_quantity(raw: i32) -> Result<u32, RepositoryError> {
    u32::try_from(raw)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative quantity in database: {raw}")))
}

/// Create a `PostgreSQL` connection pool.
///
/// The acquire timeout bounds how long any repository call waits for a
/// connection; callers never block indefinitely on the database.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    settings: DatabaseConfig,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(1)
        .acquire_timeout(settings.acquire_timeout)
        .connect(database_url.expose_secret())
        .await
}
