//! Store and price table repository.

use sqlx::PgPool;

use saleflow_core::{Barcode, PriceRow, StoreId};

use super::{RepositoryError, conflict_on_unique};
use crate::services::pricing::PriceCatalog;

/// Fields for creating or refreshing a store.
#[derive(Debug, Clone)]
pub struct NewStore {
    pub id: StoreId,
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

/// Repository for stores and their price tables.
#[derive(Debug, Clone)]
pub struct PriceRepository {
    pool: PgPool,
}

impl PriceRepository {
    /// Create a new price repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a store, or update its name and active flag if it exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another store already uses the code.
    pub async fn upsert_store(&self, store: &NewStore) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO saleflow.store (id, code, name, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    is_active = EXCLUDED.is_active,
                    updated_at = now()
            ",
        )
        .bind(&store.id)
        .bind(&store.code)
        .bind(&store.name)
        .bind(store.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "store code"))?;

        Ok(())
    }

    /// Add a price version for a product.
    ///
    /// Returns `false` if this (store, barcode, version) already exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_price(&self, row: &PriceRow) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO saleflow.price_table (store_id, barcode, price, version, valid_from, valid_to)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ON CONSTRAINT price_table_store_barcode_version_key DO NOTHING
            ",
        )
        .bind(&row.store_id)
        .bind(&row.barcode)
        .bind(row.price)
        .bind(&row.version)
        .bind(row.valid_from)
        .bind(row.valid_to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

impl PriceCatalog for PriceRepository {
    async fn is_store_active(&self, store_id: &StoreId) -> Result<bool, RepositoryError> {
        let active: Option<bool> = sqlx::query_scalar(
            r"
            SELECT is_active
            FROM saleflow.store
            WHERE id = $1
            ",
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(active.unwrap_or(false))
    }

    async fn price_rows(
        &self,
        store_id: &StoreId,
        barcode: &Barcode,
    ) -> Result<Vec<PriceRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, PriceRow>(
            r"
            SELECT store_id, barcode, price, version, valid_from, valid_to
            FROM saleflow.price_table
            WHERE store_id = $1 AND barcode = $2
            ORDER BY valid_from DESC
            ",
        )
        .bind(store_id)
        .bind(barcode)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
