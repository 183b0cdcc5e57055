//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use saleflow_core::TransitionError;

use crate::db::RepositoryError;
use crate::services::pricing::PricingError;
use crate::services::sales::SaleError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Sale finalization failed.
    #[error("Sale error: {0}")]
    Sale(#[from] SaleError),

    /// Price resolution failed.
    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    /// Sale status transition was refused.
    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller identity is missing.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with an earlier one.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body sent with every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    /// HTTP status this error is reported with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Sale(err) => match err {
                SaleError::SessionNotFound(_) | SaleError::SaleNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                SaleError::SessionNotOwned
                | SaleError::SessionNotClosed(_)
                | SaleError::SaleNotOwned => StatusCode::BAD_REQUEST,
                SaleError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Pricing(err) => match err {
                PricingError::StoreNotFound(_) | PricingError::PriceNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                PricingError::InvalidQuantity => StatusCode::BAD_REQUEST,
                PricingError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Transition(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    // Don't expose internal error details to clients
    fn client_message(&self) -> String {
        if self.status().is_server_error() {
            return "Internal server error".to_string();
        }

        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Sale(err) => err.to_string(),
            Self::Pricing(err) => err.to_string(),
            Self::Transition(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            error: self.client_message(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the calling customer.
pub fn set_sentry_user(customer_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer_id.to_string()),
            ..Default::default()
        }));
    });
}
