//! Integration tests for Saleflow.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory tests (no services needed)
//! cargo test -p saleflow-integration-tests
//!
//! # Tests against a running API and database
//! cargo test -p saleflow-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `sale_finalization` - Session to sale workflow
//! - `idempotency_guard` - Guard, cache and middleware
//! - `price_resolver` - Price selection and line pricing
//! - `sale_state_machine` - Status transition table
//! - `live_api` - HTTP round trips against a running server (ignored by default)
//!
//! This library provides in-memory collaborators shared by the tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use saleflow_api::db::RepositoryError;
use saleflow_api::services::pricing::PriceCatalog;
use saleflow_api::services::sales::{SaleStore, SessionSource};
use saleflow_core::clock::ManualClock;
use saleflow_core::{
    Barcode, CartLine, Clock, CustomerId, NewSale, PriceRow, PriceVersion, Sale, SaleId, Session,
    SessionId, SessionStatus, StoreId,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed instant used as "now" across tests.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A manual clock starting at [`epoch`].
#[must_use]
pub fn test_clock() -> ManualClock {
    ManualClock::new(epoch())
}

/// One cart line with a unit price equal to its total.
#[must_use]
pub fn cart_line(code: &str, quantity: u32, line_total: Decimal) -> CartLine {
    CartLine {
        product_code: Barcode::new(code),
        quantity,
        unit_price: line_total / Decimal::from(quantity.max(1)),
        price_version: PriceVersion::new("v1"),
        line_total,
    }
}

/// A session with the given owner, status and cart; total is the cart sum.
#[must_use]
pub fn session(id: &str, customer: &str, status: SessionStatus, cart: Vec<CartLine>) -> Session {
    let total = cart.iter().map(|line| line.line_total).sum();
    Session {
        id: SessionId::new(id),
        store_id: StoreId::new("loja-1"),
        customer_id: CustomerId::new(customer),
        status,
        cart,
        total,
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Session collaborator backed by a map.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessions {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl InMemorySessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a session.
    pub fn insert(&self, session: Session) {
        lock(&self.sessions).insert(session.id.clone(), session);
    }

    /// Edit a stored session in place.
    pub fn update(&self, id: &SessionId, edit: impl FnOnce(&mut Session)) {
        if let Some(session) = lock(&self.sessions).get_mut(id) {
            edit(session);
        }
    }
}

impl SessionSource for InMemorySessions {
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Ok(lock(&self.sessions).get(id).cloned())
    }
}

// =============================================================================
// Sales
// =============================================================================

/// Sale store with a unique `session_id`, like the database.
///
/// `insert` yields to the scheduler before writing, so concurrent creators
/// can both pass the existence check and race on the uniqueness rule.
#[derive(Debug, Clone)]
pub struct InMemorySales {
    sales: Arc<Mutex<HashMap<SaleId, Sale>>>,
    writes: Arc<AtomicUsize>,
    stale_lookups: Arc<AtomicUsize>,
    clock: ManualClock,
}

impl Default for InMemorySales {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySales {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sales: Arc::default(),
            writes: Arc::default(),
            stale_lookups: Arc::default(),
            clock: test_clock(),
        }
    }

    /// Number of sales successfully written.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of sales stored.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.sales).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next `count` lookups by session miss, as if reading from a
    /// replica that has not caught up.
    pub fn miss_next_session_lookups(&self, count: usize) {
        self.stale_lookups.store(count, Ordering::SeqCst);
    }

    fn take_stale_lookup(&self) -> bool {
        self.stale_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl SaleStore for InMemorySales {
    async fn find_by_id(&self, id: SaleId) -> Result<Option<Sale>, RepositoryError> {
        Ok(lock(&self.sales).get(&id).cloned())
    }

    async fn find_by_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Sale>, RepositoryError> {
        if self.take_stale_lookup() {
            return Ok(None);
        }

        Ok(lock(&self.sales)
            .values()
            .find(|sale| sale.session_id() == session_id)
            .cloned())
    }

    async fn insert(&self, sale: NewSale) -> Result<Sale, RepositoryError> {
        tokio::task::yield_now().await;

        let mut sales = lock(&self.sales);
        if sales.values().any(|existing| existing.session_id() == &sale.session_id) {
            return Err(RepositoryError::Conflict(
                "sale_session_id_key".to_string(),
            ));
        }

        let sale = sale.into_sale(self.clock.now());
        sales.insert(sale.id(), sale.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(sale)
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Store and price table collaborator backed by vectors.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    stores: Arc<Mutex<HashMap<StoreId, bool>>>,
    rows: Arc<Mutex<Vec<PriceRow>>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_store(&self, id: &str, active: bool) {
        lock(&self.stores).insert(StoreId::new(id), active);
    }

    /// Add a price row. `valid_to` of `None` means open-ended.
    pub fn add_price(
        &self,
        store: &str,
        barcode: &str,
        price: Decimal,
        version: &str,
        valid_from: DateTime<Utc>,
        valid_to: Option<DateTime<Utc>>,
    ) {
        lock(&self.rows).push(PriceRow {
            store_id: StoreId::new(store),
            barcode: Barcode::new(barcode),
            price,
            version: PriceVersion::new(version),
            valid_from,
            valid_to,
        });
    }
}

impl PriceCatalog for InMemoryCatalog {
    async fn is_store_active(&self, store_id: &StoreId) -> Result<bool, RepositoryError> {
        Ok(lock(&self.stores).get(store_id).copied().unwrap_or(false))
    }

    async fn price_rows(
        &self,
        store_id: &StoreId,
        barcode: &Barcode,
    ) -> Result<Vec<PriceRow>, RepositoryError> {
        Ok(lock(&self.rows)
            .iter()
            .filter(|row| &row.store_id == store_id && &row.barcode == barcode)
            .cloned()
            .collect())
    }
}
