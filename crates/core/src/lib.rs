//! Saleflow Core - Domain types and rules for sale finalization.
//!
//! This crate provides the pieces of the sale finalization engine that do no
//! I/O and can be reasoned about in isolation. It is shared by:
//! - `api` - HTTP service wiring persistence, sessions and pricing together
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types, pure functions and traits - no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere, including deterministic tests.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices and statuses
//! - [`session`] - Read model of a shopping session
//! - [`sale`] - The immutable sale record and its cart snapshot
//! - [`state_machine`] - Sale status transition rules
//! - [`pricing`] - Price table rows, quotes and priced lines
//! - [`clock`] - Time source abstraction

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod clock;
pub mod pricing;
pub mod sale;
pub mod session;
pub mod state_machine;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use pricing::{PriceQuote, PriceRow, PricedLine};
pub use sale::{NewSale, Sale, SaleLine};
pub use session::{CartLine, Session};
pub use state_machine::{SaleStateMachine, TransitionError};
pub use types::*;
