//! Price routes.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use saleflow_core::{Barcode, PriceQuote, PricedLine, StoreId};

use crate::error::Result;
use crate::middleware::RequireCustomer;
use crate::state::AppState;

/// Quote the current price of a product.
///
/// GET /stores/{store_id}/prices/{barcode}
///
/// # Errors
///
/// Returns `AppError` if the store or the price is not found.
#[instrument(skip_all, fields(store_id = %store_id, barcode = %barcode))]
pub async fn quote(
    State(state): State<AppState>,
    Path((store_id, barcode)): Path<(StoreId, Barcode)>,
) -> Result<Json<PriceQuote>> {
    let quote = state.pricing().get_price(&store_id, &barcode).await?;
    Ok(Json(quote))
}

/// Request to price a cart line.
///
/// Unknown fields are rejected, so a client-supplied price or total fails
/// to deserialize.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PriceLineRequest {
    pub barcode: Barcode,
    pub quantity: u32,
}

/// Price a cart line server-side.
///
/// POST /stores/{store_id}/lines
///
/// # Errors
///
/// Returns `AppError` for a zero quantity, an unknown store or product.
#[instrument(skip_all, fields(store_id = %store_id, customer_id = %customer_id, barcode = %request.barcode))]
pub async fn price_line(
    State(state): State<AppState>,
    RequireCustomer(customer_id): RequireCustomer,
    Path(store_id): Path<StoreId>,
    Json(request): Json<PriceLineRequest>,
) -> Result<Json<PricedLine>> {
    let line = state
        .pricing()
        .price_line(&store_id, &request.barcode, request.quantity)
        .await?;
    Ok(Json(line))
}
