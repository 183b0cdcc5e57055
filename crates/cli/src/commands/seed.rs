//! Seed stores, price tables and shopping sessions from a YAML file.
//!
//! Session lines are priced through the same resolver the API uses, so
//! seeded carts never carry prices that the price table would not produce.
//! Re-running the command is safe: existing stores are refreshed, existing
//! price versions and sessions are skipped.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use saleflow_api::db::{NewStore, PriceRepository};
use saleflow_api::services::pricing::PricingService;
use saleflow_core::{
    Barcode, CartLine, CustomerId, PriceRow, PriceVersion, SessionId, SessionStatus, StoreId,
    SystemClock,
};

use super::{CommandError, connect};

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    stores: Vec<StoreSeed>,
    #[serde(default)]
    sessions: Vec<SessionSeed>,
}

#[derive(Debug, Deserialize)]
struct StoreSeed {
    id: StoreId,
    code: String,
    name: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    prices: Vec<PriceSeed>,
}

const fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct PriceSeed {
    barcode: Barcode,
    price: Decimal,
    version: PriceVersion,
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SessionStatusSeed {
    Active,
    Closed,
    Abandoned,
}

impl From<SessionStatusSeed> for SessionStatus {
    fn from(status: SessionStatusSeed) -> Self {
        match status {
            SessionStatusSeed::Active => Self::Active,
            SessionStatusSeed::Closed => Self::Closed,
            SessionStatusSeed::Abandoned => Self::Abandoned,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionSeed {
    id: SessionId,
    store_id: StoreId,
    customer_id: CustomerId,
    status: SessionStatusSeed,
    #[serde(default)]
    items: Vec<ItemSeed>,
}

#[derive(Debug, Deserialize)]
struct ItemSeed {
    barcode: Barcode,
    quantity: u32,
}

/// Load the seed file at `path` into the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a session item
/// has no price, or a database operation fails.
pub async fn run(path: &Path) -> Result<(), CommandError> {
    info!(path = %path.display(), "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    info!(
        stores = seed.stores.len(),
        sessions = seed.sessions.len(),
        "Parsed seed file"
    );

    let pool = connect().await?;
    let prices = PriceRepository::new(pool.clone());

    let mut inserted = 0_usize;
    let mut skipped = 0_usize;
    for store in &seed.stores {
        prices
            .upsert_store(&NewStore {
                id: store.id.clone(),
                code: store.code.clone(),
                name: store.name.clone(),
                is_active: store.active,
            })
            .await?;

        for price in &store.prices {
            let row = PriceRow {
                store_id: store.id.clone(),
                barcode: price.barcode.clone(),
                price: price.price,
                version: price.version.clone(),
                valid_from: price.valid_from,
                valid_to: price.valid_to,
            };
            if prices.insert_price(&row).await? {
                inserted += 1;
            } else {
                skipped += 1;
            }
        }
    }
    info!(stores = seed.stores.len(), inserted, skipped, "Stores and prices seeded");

    let pricing = PricingService::new(prices, Arc::new(SystemClock));
    for session in seed.sessions {
        let mut cart = Vec::with_capacity(session.items.len());
        for item in &session.items {
            let line = pricing
                .price_line(&session.store_id, &item.barcode, item.quantity)
                .await?;
            cart.push(CartLine::from(line));
        }

        let created = insert_session(&pool, &session, &cart).await?;
        info!(session_id = %session.id, created, lines = cart.len(), "Session seeded");
    }

    info!("Seeding complete!");
    Ok(())
}

async fn insert_session(
    pool: &PgPool,
    session: &SessionSeed,
    cart: &[CartLine],
) -> Result<bool, CommandError> {
    let total: Decimal = cart.iter().map(|line| line.line_total).sum();
    let status = SessionStatus::from(session.status);

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r"
        INSERT INTO saleflow.session (id, store_id, customer_id, status, total)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO NOTHING
        ",
    )
    .bind(&session.id)
    .bind(&session.store_id)
    .bind(&session.customer_id)
    .bind(status)
    .bind(total)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    for (index, line) in cart.iter().enumerate() {
        let position = i32::try_from(index)
            .map_err(|_| CommandError::InvalidSeed(format!("session {} has too many items", session.id)))?;
        let quantity = i32::try_from(line.quantity)
            .map_err(|_| CommandError::InvalidSeed(format!("quantity {} out of range", line.quantity)))?;

        sqlx::query(
            r"
            INSERT INTO saleflow.session_item
                (session_id, position, product_code, quantity, unit_price, price_version, line_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(&session.id)
        .bind(position)
        .bind(&line.product_code)
        .bind(quantity)
        .bind(line.unit_price)
        .bind(&line.price_version)
        .bind(line.line_total)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_seed_file_parses() {
        let seed: SeedFile = serde_yaml::from_str(include_str!("../../seed/demo.yaml")).unwrap();

        assert_eq!(seed.stores.len(), 2);
        assert!(!seed.stores[1].active);
        assert_eq!(seed.stores[0].prices.len(), 3);
        assert!(seed.stores[0].prices[1].valid_to.is_none());
        assert_eq!(seed.sessions[0].id.as_str(), "s1");
        assert!(matches!(seed.sessions[0].status, SessionStatusSeed::Closed));
    }

    #[test]
    fn test_store_defaults_to_active() {
        let seed: SeedFile = serde_yaml::from_str(
            "stores:\n  - id: a\n    code: \"1\"\n    name: A\n",
        )
        .unwrap();

        assert!(seed.stores[0].active);
        assert!(seed.stores[0].prices.is_empty());
        assert!(seed.sessions.is_empty());
    }
}
