//! Read model of a shopping session.
//!
//! Sessions are built, priced and closed by the session collaborator. This
//! crate only reads them when converting a closed session into a sale.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Barcode, CustomerId, PriceVersion, SessionId, SessionStatus, StoreId};

/// One priced line of a session's cart.
///
/// Unit price and version were captured from a server-side price quote when
/// the line was added; `line_total` is `unit_price * quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_code: Barcode,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub price_version: PriceVersion,
    pub line_total: Decimal,
}

/// A shopping session as exposed by the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub status: SessionStatus,
    pub cart: Vec<CartLine>,
    /// Server-computed cart total.
    pub total: Decimal,
}

impl Session {
    /// Whether `customer` owns this session.
    #[must_use]
    pub fn is_owned_by(&self, customer: &CustomerId) -> bool {
        &self.customer_id == customer
    }

    /// Whether the session has been closed and can become a sale.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status == SessionStatus::Closed
    }
}
