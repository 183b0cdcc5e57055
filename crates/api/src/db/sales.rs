//! Sale repository.
//!
//! A sale and its lines are written in one transaction. The unique
//! constraint `sale_session_id_key` guarantees at most one sale per session;
//! losing that race surfaces as [`RepositoryError::Conflict`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use saleflow_core::{
    Barcode, CustomerId, NewSale, PriceVersion, Sale, SaleId, SaleLine, SaleStatus, SessionId,
    StoreId,
};

use super::{RepositoryError, conflict_on_unique, stored_quantity};
use crate::services::sales::SaleStore;

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: SaleId,
    session_id: SessionId,
    store_id: StoreId,
    customer_id: CustomerId,
    total: Decimal,
    status: SaleStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SaleItemRow {
    product_code: Barcode,
    quantity: i32,
    unit_price: Decimal,
    price_version: PriceVersion,
    line_total: Decimal,
}

impl TryFrom<SaleItemRow> for SaleLine {
    type Error = RepositoryError;

    fn try_from(row: SaleItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_code: row.product_code,
            quantity: stored_quantity(row.quantity)?,
            unit_price: row.unit_price,
            price_version: row.price_version,
            line_total: row.line_total,
        })
    }
}

/// Repository for sale rows.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: PgPool,
}

impl SaleRepository {
    /// Create a new sale repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: SaleRow) -> Result<Sale, RepositoryError> {
        let items = sqlx::query_as::<_, SaleItemRow>(
            r"
            SELECT product_code, quantity, unit_price, price_version, line_total
            FROM saleflow.sale_item
            WHERE sale_id = $1
            ORDER BY position
            ",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(SaleLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        let record = NewSale {
            id: row.id,
            session_id: row.session_id,
            store_id: row.store_id,
            customer_id: row.customer_id,
            total: row.total,
            status: row.status,
            items,
        };
        Ok(record.into_sale(row.created_at))
    }
}

impl SaleStore for SaleRepository {
    async fn find_by_id(&self, id: SaleId) -> Result<Option<Sale>, RepositoryError> {
        let row = sqlx::query_as::<_, SaleRow>(
            r"
            SELECT id, session_id, store_id, customer_id, total, status, created_at
            FROM saleflow.sale
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_session(&self, session_id: &SessionId) -> Result<Option<Sale>, RepositoryError> {
        let row = sqlx::query_as::<_, SaleRow>(
            r"
            SELECT id, session_id, store_id, customer_id, total, status, created_at
            FROM saleflow.sale
            WHERE session_id = $1
            ",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, sale: NewSale) -> Result<Sale, RepositoryError> {
        // Dropping `tx` before commit (error or request cancellation) rolls
        // the whole sale back.
        let mut tx = self.pool.begin().await?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r"
            INSERT INTO saleflow.sale (id, session_id, store_id, customer_id, total, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING created_at
            ",
        )
        .bind(sale.id)
        .bind(&sale.session_id)
        .bind(&sale.store_id)
        .bind(&sale.customer_id)
        .bind(sale.total)
        .bind(sale.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "sale for this session"))?;

        for (position, item) in sale.items.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                RepositoryError::DataCorruption(format!("too many sale lines: {position}"))
            })?;
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!("quantity out of range: {}", item.quantity))
            })?;

            sqlx::query(
                r"
                INSERT INTO saleflow.sale_item
                    (sale_id, position, product_code, quantity, unit_price, price_version, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(sale.id)
            .bind(position)
            .bind(&item.product_code)
            .bind(quantity)
            .bind(item.unit_price)
            .bind(&item.price_version)
            .bind(item.line_total)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(sale.into_sale(created_at))
    }
}
