//! Price table rows, quotes and priced lines.
//!
//! A [`PriceQuote`] is the only legitimate source of a unit price. Lines are
//! priced by multiplying a quote by a quantity on the server; a price or
//! total sent by a client is never used.

use std::num::NonZeroU32;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::session::CartLine;
use crate::types::{Barcode, CurrencyCode, Price, PriceVersion, StoreId};

/// How long a quote stays valid when its price row has no explicit end.
pub const DEFAULT_QUOTE_HORIZON: Duration = Duration::hours(24);

/// One versioned entry of a store's price table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct PriceRow {
    pub store_id: StoreId,
    pub barcode: Barcode,
    pub price: Decimal,
    pub version: PriceVersion,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

/// Pick the row that governs the current price.
///
/// The row with the latest `valid_from` wins; equal start times fall back to
/// the greatest version token. Rows whose `valid_to` has already passed are
/// not filtered out.
#[must_use]
pub fn select_effective_price(rows: &[PriceRow]) -> Option<&PriceRow> {
    rows.iter().max_by(|a, b| {
        a.valid_from
            .cmp(&b.valid_from)
            .then_with(|| a.version.cmp(&b.version))
    })
}

/// A server-issued, versioned price for one product in one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub store_id: StoreId,
    pub barcode: Barcode,
    pub price: Price,
    pub version: PriceVersion,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

impl PriceQuote {
    /// Build a quote from the effective row at `now`.
    #[must_use]
    pub fn from_row(row: &PriceRow, now: DateTime<Utc>) -> Self {
        Self {
            store_id: row.store_id.clone(),
            barcode: row.barcode.clone(),
            price: Price::new(row.price, CurrencyCode::default()),
            version: row.version.clone(),
            valid_from: row.valid_from,
            valid_until: row.valid_to.unwrap_or(now + DEFAULT_QUOTE_HORIZON),
            generated_at: now,
        }
    }
}

/// A cart line priced from a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_code: Barcode,
    pub quantity: u32,
    pub unit_price: Price,
    pub price_version: PriceVersion,
    pub line_total: Price,
}

impl PricedLine {
    /// Price `quantity` units at the quoted price.
    #[must_use]
    pub fn from_quote(quote: &PriceQuote, quantity: NonZeroU32) -> Self {
        Self {
            product_code: quote.barcode.clone(),
            quantity: quantity.get(),
            unit_price: quote.price,
            price_version: quote.version.clone(),
            line_total: quote.price.times(quantity.get()),
        }
    }
}

impl From<PricedLine> for CartLine {
    fn from(line: PricedLine) -> Self {
        Self {
            product_code: line.product_code,
            quantity: line.quantity,
            unit_price: line.unit_price.amount,
            price_version: line.price_version,
            line_total: line.line_total.amount,
        }
    }
}
