//! The sale record and the cart snapshot it is built from.
//!
//! A sale is created exactly once per session. After creation its lines and
//! every priced value on it are frozen; the only field that changes is the
//! status, and only through [`Sale::transition_to`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::session::{CartLine, Session};
use crate::state_machine::{SaleStateMachine, TransitionError};
use crate::types::{Barcode, CustomerId, PriceVersion, SaleId, SaleStatus, SessionId, StoreId};

/// A frozen copy of one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_code: Barcode,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub price_version: PriceVersion,
    pub line_total: Decimal,
}

impl From<&CartLine> for SaleLine {
    fn from(line: &CartLine) -> Self {
        Self {
            product_code: line.product_code.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            price_version: line.price_version.clone(),
            line_total: line.line_total,
        }
    }
}

/// Sale fields prior to persistence.
///
/// Built by [`NewSale::snapshot`] for inserts, and by repositories when
/// rehydrating a stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    pub id: SaleId,
    pub session_id: SessionId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub total: Decimal,
    pub status: SaleStatus,
    pub items: Vec<SaleLine>,
}

impl NewSale {
    /// Snapshot a session into a new sale in the `Created` state.
    ///
    /// The lines are value copies: later changes to the session's cart do
    /// not reach the sale. The total is the session's server-computed total.
    #[must_use]
    pub fn snapshot(session: &Session) -> Self {
        Self {
            id: SaleId::generate(),
            session_id: session.id.clone(),
            store_id: session.store_id.clone(),
            customer_id: session.customer_id.clone(),
            total: session.total,
            status: SaleStatus::Created,
            items: session.cart.iter().map(SaleLine::from).collect(),
        }
    }

    /// Attach the creation timestamp assigned by storage.
    #[must_use]
    pub fn into_sale(self, created_at: DateTime<Utc>) -> Sale {
        Sale {
            id: self.id,
            session_id: self.session_id,
            store_id: self.store_id,
            customer_id: self.customer_id,
            total: self.total,
            status: self.status,
            items: self.items,
            created_at,
        }
    }
}

/// A finalized sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    id: SaleId,
    session_id: SessionId,
    store_id: StoreId,
    customer_id: CustomerId,
    total: Decimal,
    status: SaleStatus,
    items: Vec<SaleLine>,
    created_at: DateTime<Utc>,
}

impl Sale {
    #[must_use]
    pub const fn id(&self) -> SaleId {
        self.id
    }

    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub const fn store_id(&self) -> &StoreId {
        &self.store_id
    }

    #[must_use]
    pub const fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    #[must_use]
    pub const fn status(&self) -> SaleStatus {
        self.status
    }

    #[must_use]
    pub fn items(&self) -> &[SaleLine] {
        &self.items
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether `customer` owns this sale.
    #[must_use]
    pub fn is_owned_by(&self, customer: &CustomerId) -> bool {
        &self.customer_id == customer
    }

    /// Check a status change without applying it.
    ///
    /// # Errors
    ///
    /// Returns the error the state machine would raise for this transition.
    pub fn can_transition_to(&self, target: SaleStatus) -> Result<(), TransitionError> {
        SaleStateMachine::new(self.status).transition_to(target)
    }

    /// Move the sale to `target` if the state machine allows it.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] and leaves the status untouched when the
    /// transition is not permitted.
    pub fn transition_to(&mut self, target: SaleStatus) -> Result<(), TransitionError> {
        let mut machine = SaleStateMachine::new(self.status);
        machine.transition_to(target)?;
        self.status = machine.current_status();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::types::SessionStatus;

    fn closed_session() -> Session {
        Session {
            id: SessionId::new("s1"),
            store_id: StoreId::new("store-1"),
            customer_id: CustomerId::new("u1"),
            status: SessionStatus::Closed,
            cart: vec![CartLine {
                product_code: Barcode::new("P1"),
                quantity: 1,
                unit_price: Decimal::from(100),
                price_version: PriceVersion::new("v1"),
                line_total: Decimal::from(100),
            }],
            total: Decimal::from(100),
        }
    }

    #[test]
    fn test_snapshot_copies_session_fields() {
        let session = closed_session();
        let new_sale = NewSale::snapshot(&session);

        assert_eq!(new_sale.session_id, session.id);
        assert_eq!(new_sale.store_id, session.store_id);
        assert_eq!(new_sale.customer_id, session.customer_id);
        assert_eq!(new_sale.total, Decimal::from(100));
        assert_eq!(new_sale.status, SaleStatus::Created);
        assert_eq!(new_sale.items.len(), 1);
        assert_eq!(new_sale.items[0].product_code, Barcode::new("P1"));
    }

    #[test]
    fn test_snapshot_is_independent_of_later_cart_changes() {
        let mut session = closed_session();
        let new_sale = NewSale::snapshot(&session);

        session.cart[0].quantity = 5;
        session.cart[0].line_total = Decimal::from(500);
        session.cart.clear();

        assert_eq!(new_sale.items[0].quantity, 1);
        assert_eq!(new_sale.items[0].line_total, Decimal::from(100));
    }

    #[test]
    fn test_each_snapshot_gets_a_fresh_id() {
        let session = closed_session();
        assert_ne!(NewSale::snapshot(&session).id, NewSale::snapshot(&session).id);
    }

    #[test]
    fn test_transition_only_changes_status() {
        let mut sale = NewSale::snapshot(&closed_session()).into_sale(Utc::now());
        let items_before = sale.items().to_vec();

        assert!(sale.transition_to(SaleStatus::AwaitingPayment).is_ok());
        assert_eq!(sale.status(), SaleStatus::AwaitingPayment);
        assert_eq!(sale.items(), items_before.as_slice());
        assert_eq!(sale.total(), Decimal::from(100));
    }

    #[test]
    fn test_rejected_transition_leaves_status_untouched() {
        let mut sale = NewSale::snapshot(&closed_session()).into_sale(Utc::now());

        assert!(sale.transition_to(SaleStatus::Paid).is_err());
        assert_eq!(sale.status(), SaleStatus::Created);
        assert!(sale.can_transition_to(SaleStatus::AwaitingPayment).is_ok());
    }
}
