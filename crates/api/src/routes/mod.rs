//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Liveness check
//! GET  /health/ready                         - Readiness check (database)
//!
//! # Sales (requires customer identity)
//! POST /sales/from-session/{session_id}      - Finalize a closed session (idempotent)
//! GET  /sales/{id}                           - Sale detail
//! GET  /sales/{id}/transitions/{target}      - Validate a status change
//!
//! # Pricing
//! GET  /stores/{store_id}/prices/{barcode}   - Current price quote
//! POST /stores/{store_id}/lines              - Price a cart line (requires customer identity)
//! ```

pub mod pricing;
pub mod sales;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::middleware::idempotency_middleware;
use crate::services::idempotency::IdempotencyGuard;
use crate::state::AppState;

/// Create the sale routes router.
///
/// Finalization runs behind the idempotency guard.
pub fn sale_routes(guard: IdempotencyGuard) -> Router<AppState> {
    Router::new()
        .route(
            "/from-session/{session_id}",
            post(sales::create_from_session)
                .route_layer(from_fn_with_state(guard, idempotency_middleware)),
        )
        .route("/{id}", get(sales::show))
        .route("/{id}/transitions/{target}", get(sales::check_transition))
}

/// Create the store pricing routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/{store_id}/prices/{barcode}", get(pricing::quote))
        .route("/{store_id}/lines", post(pricing::price_line))
}

/// Create all routes for the API.
pub fn routes(guard: IdempotencyGuard) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/sales", sale_routes(guard))
        .nest("/stores", store_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
