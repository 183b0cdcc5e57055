//! Sale finalization.
//!
//! Converts a closed shopping session into a sale exactly once. The session
//! ID is the idempotency key: repeated or concurrent calls for the same
//! session all observe the same sale.
//!
//! # Flow
//!
//! 1. Read the session from the [`SessionSource`]
//! 2. Check the caller owns it and that it is closed
//! 3. Return the existing sale for the session, if any
//! 4. Snapshot the cart into a new sale and insert it
//! 5. If the insert loses a race on the unique `session_id`, re-read and
//!    return the winner's sale

mod error;

use std::future::Future;

use tracing::{debug, info, instrument, warn};

use saleflow_core::{CustomerId, NewSale, Sale, SaleId, Session, SessionId};

pub use error::SaleError;

use crate::db::RepositoryError;

/// Read contract of the session collaborator.
pub trait SessionSource: Send + Sync {
    /// Fetch a session by ID, `None` if it does not exist.
    fn get_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<Session>, RepositoryError>> + Send;
}

/// Persistence boundary for sales.
///
/// Implementations must enforce a unique `session_id` and report a second
/// insert for the same session as [`RepositoryError::Conflict`]. An insert
/// is all-or-nothing: either the sale and all its lines become visible, or
/// nothing does.
pub trait SaleStore: Send + Sync {
    fn find_by_id(
        &self,
        id: SaleId,
    ) -> impl Future<Output = Result<Option<Sale>, RepositoryError>> + Send;

    fn find_by_session(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Option<Sale>, RepositoryError>> + Send;

    fn insert(&self, sale: NewSale) -> impl Future<Output = Result<Sale, RepositoryError>> + Send;
}

/// Outcome of finalizing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalization {
    /// This call inserted the sale.
    Created(Sale),
    /// The session already had a sale, possibly inserted by a concurrent call.
    Existing(Sale),
}

impl Finalization {
    /// Whether this call inserted the sale.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    #[must_use]
    pub fn into_sale(self) -> Sale {
        match self {
            Self::Created(sale) | Self::Existing(sale) => sale,
        }
    }
}

/// Service that finalizes sessions into sales.
#[derive(Debug, Clone)]
pub struct SaleService<S, R> {
    sessions: S,
    sales: R,
}

impl<S, R> SaleService<S, R>
where
    S: SessionSource,
    R: SaleStore,
{
    /// Create a new sale service.
    #[must_use]
    pub const fn new(sessions: S, sales: R) -> Self {
        Self { sessions, sales }
    }

    /// Create the sale for a closed session, or return the one that exists.
    ///
    /// Safe to retry indefinitely with the same session ID.
    ///
    /// # Errors
    ///
    /// See [`SaleService::finalize_session`].
    pub async fn create_sale_from_session(
        &self,
        session_id: &SessionId,
        customer_id: &CustomerId,
    ) -> Result<Sale, SaleError> {
        self.finalize_session(session_id, customer_id)
            .await
            .map(Finalization::into_sale)
    }

    /// Like [`SaleService::create_sale_from_session`], but reports whether
    /// this call inserted the sale.
    ///
    /// # Errors
    ///
    /// - `SaleError::SessionNotFound` if the session does not exist
    /// - `SaleError::SessionNotOwned` if `customer_id` does not own it
    /// - `SaleError::SessionNotClosed` if the session is not closed
    /// - `SaleError::Repository` if persistence fails
    #[instrument(skip_all, fields(session_id = %session_id, customer_id = %customer_id))]
    pub async fn finalize_session(
        &self,
        session_id: &SessionId,
        customer_id: &CustomerId,
    ) -> Result<Finalization, SaleError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or_else(|| SaleError::SessionNotFound(session_id.clone()))?;

        if !session.is_owned_by(customer_id) {
            return Err(SaleError::SessionNotOwned);
        }

        if !session.is_closed() {
            return Err(SaleError::SessionNotClosed(session.status));
        }

        if let Some(existing) = self.sales.find_by_session(session_id).await? {
            debug!(sale_id = %existing.id(), "Sale already exists for session");
            return Ok(Finalization::Existing(existing));
        }

        match self.sales.insert(NewSale::snapshot(&session)).await {
            Ok(sale) => {
                info!(sale_id = %sale.id(), total = %sale.total(), "Sale created from session");
                Ok(Finalization::Created(sale))
            }
            Err(RepositoryError::Conflict(reason)) => {
                warn!(%reason, "Lost sale creation race, returning the existing sale");
                let winner = self.sales.find_by_session(session_id).await?.ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "sale for session {session_id} conflicted but cannot be read"
                    ))
                })?;
                Ok(Finalization::Existing(winner))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a sale owned by `customer_id`.
    ///
    /// # Errors
    ///
    /// - `SaleError::SaleNotFound` if no sale has this ID
    /// - `SaleError::SaleNotOwned` if it belongs to another customer
    /// - `SaleError::Repository` if persistence fails
    #[instrument(skip_all, fields(sale_id = %sale_id, customer_id = %customer_id))]
    pub async fn get_sale(&self, sale_id: SaleId, customer_id: &CustomerId) -> Result<Sale, SaleError> {
        let sale = self
            .sales
            .find_by_id(sale_id)
            .await?
            .ok_or(SaleError::SaleNotFound(sale_id))?;

        if !sale.is_owned_by(customer_id) {
            return Err(SaleError::SaleNotOwned);
        }

        Ok(sale)
    }
}
