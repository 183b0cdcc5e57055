//! Session read model.
//!
//! The session service owns these tables; this repository only reads them.

use rust_decimal::Decimal;
use sqlx::PgPool;

use saleflow_core::{
    Barcode, CartLine, CustomerId, PriceVersion, Session, SessionId, SessionStatus, StoreId,
};

use super::{RepositoryError, stored_quantity};
use crate::services::sales::SessionSource;

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: SessionId,
    store_id: StoreId,
    customer_id: CustomerId,
    status: SessionStatus,
    total: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct SessionItemRow {
    product_code: Barcode,
    quantity: i32,
    unit_price: Decimal,
    price_version: PriceVersion,
    line_total: Decimal,
}

/// Read-only access to shopping sessions.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SessionSource for SessionRepository {
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, SessionRow>(
            r"
            SELECT id, store_id, customer_id, status, total
            FROM saleflow.session
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let cart = sqlx::query_as::<_, SessionItemRow>(
            r"
            SELECT product_code, quantity, unit_price, price_version, line_total
            FROM saleflow.session_item
            WHERE session_id = $1
            ORDER BY position
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|item| {
            Ok(CartLine {
                product_code: item.product_code,
                quantity: stored_quantity(item.quantity)?,
                unit_price: item.unit_price,
                price_version: item.price_version,
                line_total: item.line_total,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Some(Session {
            id: row.id,
            store_id: row.store_id,
            customer_id: row.customer_id,
            status: row.status,
            cart,
            total: row.total,
        }))
    }
}
