//! Caller identity extractor.
//!
//! Authentication happens upstream. The gateway forwards the verified
//! customer ID in [`CUSTOMER_ID_HEADER`]; this service trusts that header
//! and never parses credentials itself.

use axum::{extract::FromRequestParts, http::request::Parts};

use saleflow_core::CustomerId;

use crate::error::{AppError, set_sentry_user};

/// Header carrying the authenticated customer ID.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

/// Extractor that requires an authenticated customer.
///
/// Rejects the request with 401 if the identity header is missing or blank.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireCustomer(customer_id): RequireCustomer,
/// ) -> impl IntoResponse {
///     format!("Hello, {customer_id}!")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireCustomer(pub CustomerId);

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer_id = parts
            .headers
            .get(CUSTOMER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(CustomerId::new)
            .ok_or_else(|| AppError::Unauthorized("customer identity required".to_string()))?;

        set_sentry_user(&customer_id);

        Ok(Self(customer_id))
    }
}
