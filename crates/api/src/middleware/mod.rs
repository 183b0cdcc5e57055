//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Idempotency guard (commit-once routes only)

pub mod auth;
pub mod idempotency;
pub mod request_id;

pub use auth::{CUSTOMER_ID_HEADER, RequireCustomer};
pub use idempotency::{IDEMPOTENCY_KEY_HEADER, idempotency_middleware};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
