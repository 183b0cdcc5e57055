//! Sale status state machine.
//!
//! ```text
//!   Created ──► AwaitingPayment ──► Paid ──► Synced (term.)
//!                     │               │
//!                     ▼               └────► PaidPendingSync
//!               Canceled (term.)
//! ```
//!
//! Rules are checked in this order:
//!
//! 1. Nothing leaves a terminal state ([`TransitionError::TerminalState`]).
//! 2. A paid sale is never canceled ([`TransitionError::Forbidden`]).
//! 3. Anything not drawn above, self-transitions included, is rejected
//!    with [`TransitionError::InvalidTransition`].

use thiserror::Error;

use crate::types::SaleStatus;

/// Why a status transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The sale is in `Canceled` or `Synced`.
    #[error("cannot transition from terminal state {from} to {to}")]
    TerminalState { from: SaleStatus, to: SaleStatus },

    /// The pair is explicitly prohibited.
    #[error("transition from {from} to {to} is prohibited")]
    Forbidden { from: SaleStatus, to: SaleStatus },

    /// The pair is not in the transition table.
    #[error("invalid state transition: {from} to {to}")]
    InvalidTransition { from: SaleStatus, to: SaleStatus },
}

/// Holds a sale's current status and validates changes to it.
///
/// Deterministic: the outcome of a transition depends only on the current
/// status and the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaleStateMachine {
    status: SaleStatus,
}

impl SaleStateMachine {
    /// Create a machine positioned at `status`.
    #[must_use]
    pub const fn new(status: SaleStatus) -> Self {
        Self { status }
    }

    #[must_use]
    pub const fn current_status(&self) -> SaleStatus {
        self.status
    }

    /// Move to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the move is not allowed; the current
    /// status is left unchanged.
    pub fn transition_to(&mut self, target: SaleStatus) -> Result<(), TransitionError> {
        check_transition(self.status, target)?;
        self.status = target;
        Ok(())
    }
}

/// Validate a single `from -> to` step.
///
/// # Errors
///
/// See [`SaleStateMachine::transition_to`].
pub const fn check_transition(from: SaleStatus, to: SaleStatus) -> Result<(), TransitionError> {
    if from.is_terminal() {
        return Err(TransitionError::TerminalState { from, to });
    }

    if matches!((from, to), (SaleStatus::Paid, SaleStatus::Canceled)) {
        return Err(TransitionError::Forbidden { from, to });
    }

    match (from, to) {
        (SaleStatus::Created, SaleStatus::AwaitingPayment)
        | (SaleStatus::AwaitingPayment, SaleStatus::Paid | SaleStatus::Canceled)
        | (SaleStatus::Paid, SaleStatus::Synced | SaleStatus::PaidPendingSync) => Ok(()),
        _ => Err(TransitionError::InvalidTransition { from, to }),
    }
}
