//! Price resolution.
//!
//! Every unit price that reaches a cart line comes from [`PricingService`].
//! Clients send a barcode and a quantity, never a price or a total.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use saleflow_core::pricing::select_effective_price;
use saleflow_core::{Barcode, Clock, PriceQuote, PriceRow, PricedLine, StoreId};

use crate::db::RepositoryError;

/// Errors that can occur while pricing a product.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Store is unknown or not trading.
    #[error("store {0} not found or inactive")]
    StoreNotFound(StoreId),

    /// The store has no price for this product.
    #[error("price for product {barcode} not found in store {store_id}")]
    PriceNotFound { store_id: StoreId, barcode: Barcode },

    /// Lines must contain at least one unit.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Source of stores and price table rows.
pub trait PriceCatalog: Send + Sync {
    /// Whether the store exists and is active.
    fn is_store_active(
        &self,
        store_id: &StoreId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// All price rows for a product in a store, in any order.
    fn price_rows(
        &self,
        store_id: &StoreId,
        barcode: &Barcode,
    ) -> impl Future<Output = Result<Vec<PriceRow>, RepositoryError>> + Send;
}

/// Resolves server-side price quotes.
#[derive(Clone)]
pub struct PricingService<C> {
    catalog: C,
    clock: Arc<dyn Clock>,
}

impl<C: PriceCatalog> PricingService<C> {
    /// Create a new pricing service.
    #[must_use]
    pub fn new(catalog: C, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, clock }
    }

    /// Quote the current price of `barcode` in `store_id`.
    ///
    /// # Errors
    ///
    /// - `PricingError::StoreNotFound` if the store is unknown or inactive
    /// - `PricingError::PriceNotFound` if the store has no row for the product
    /// - `PricingError::Repository` if the catalog query fails
    #[instrument(skip(self), fields(store_id = %store_id, barcode = %barcode))]
    pub async fn get_price(
        &self,
        store_id: &StoreId,
        barcode: &Barcode,
    ) -> Result<PriceQuote, PricingError> {
        if !self.catalog.is_store_active(store_id).await? {
            return Err(PricingError::StoreNotFound(store_id.clone()));
        }

        let rows = self.catalog.price_rows(store_id, barcode).await?;
        let row = select_effective_price(&rows).ok_or_else(|| PricingError::PriceNotFound {
            store_id: store_id.clone(),
            barcode: barcode.clone(),
        })?;

        let quote = PriceQuote::from_row(row, self.clock.now());
        debug!(version = %quote.version, price = %quote.price.amount, "Price resolved");
        Ok(quote)
    }

    /// Price `quantity` units of a product for a cart line.
    ///
    /// # Errors
    ///
    /// Returns `PricingError::InvalidQuantity` for a zero quantity, otherwise
    /// the errors of [`Self::get_price`].
    pub async fn price_line(
        &self,
        store_id: &StoreId,
        barcode: &Barcode,
        quantity: u32,
    ) -> Result<PricedLine, PricingError> {
        let quantity = NonZeroU32::new(quantity).ok_or(PricingError::InvalidQuantity)?;
        let quote = self.get_price(store_id, barcode).await?;
        Ok(PricedLine::from_quote(&quote, quantity))
    }
}
