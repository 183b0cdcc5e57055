//! Sale finalization error types.

use thiserror::Error;

use saleflow_core::{SaleId, SessionId, SessionStatus};

use crate::db::RepositoryError;

/// Errors that can occur while creating or reading a sale.
#[derive(Debug, Error)]
pub enum SaleError {
    /// The session collaborator has no such session.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The session belongs to a different customer.
    #[error("session belongs to another customer")]
    SessionNotOwned,

    /// Only closed sessions can become sales.
    #[error("session must be closed to convert to a sale (current: {0})")]
    SessionNotClosed(SessionStatus),

    /// No sale with this ID.
    #[error("sale {0} not found")]
    SaleNotFound(SaleId),

    /// The sale belongs to a different customer.
    #[error("sale belongs to another customer")]
    SaleNotOwned,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
