//! Business logic services.
//!
//! # Services
//!
//! - `sales` - Idempotent session to sale finalization
//! - `pricing` - Server-side price resolution
//! - `idempotency` - Duplicate submission guard for commit-once endpoints

pub mod idempotency;
pub mod pricing;
pub mod sales;
