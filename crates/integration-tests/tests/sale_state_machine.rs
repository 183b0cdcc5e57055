//! Integration tests for the sale status state machine.
//!
//! Walks every (from, to) pair against the transition table.

#![allow(clippy::unwrap_used)]

use saleflow_core::{SaleStateMachine, SaleStatus, TransitionError};

use SaleStatus::{AwaitingPayment, Canceled, Created, Paid, PaidPendingSync, Synced};

const ALLOWED: [(SaleStatus, SaleStatus); 5] = [
    (Created, AwaitingPayment),
    (AwaitingPayment, Paid),
    (AwaitingPayment, Canceled),
    (Paid, Synced),
    (Paid, PaidPendingSync),
];

#[test]
fn test_every_allowed_pair_succeeds() {
    for (from, to) in ALLOWED {
        let mut machine = SaleStateMachine::new(from);
        machine.transition_to(to).unwrap();
        assert_eq!(machine.current_status(), to, "{from} -> {to}");
    }
}

#[test]
fn test_every_other_pair_fails_and_keeps_status() {
    for from in SaleStatus::ALL {
        for to in SaleStatus::ALL {
            if ALLOWED.contains(&(from, to)) {
                continue;
            }

            let mut machine = SaleStateMachine::new(from);
            let err = machine.transition_to(to).unwrap_err();
            assert_eq!(machine.current_status(), from, "{from} -> {to}");

            let expected_terminal = from.is_terminal();
            let expected_forbidden = (from, to) == (Paid, Canceled);
            match err {
                TransitionError::TerminalState { .. } => assert!(expected_terminal),
                TransitionError::Forbidden { .. } => assert!(expected_forbidden),
                TransitionError::InvalidTransition { .. } => {
                    assert!(!expected_terminal && !expected_forbidden);
                }
            }
        }
    }
}

#[test]
fn test_paid_cannot_be_canceled() {
    let mut machine = SaleStateMachine::new(Paid);
    assert_eq!(
        machine.transition_to(Canceled),
        Err(TransitionError::Forbidden {
            from: Paid,
            to: Canceled
        })
    );
}

#[test]
fn test_synced_rejects_everything_as_terminal() {
    for to in SaleStatus::ALL {
        let mut machine = SaleStateMachine::new(Synced);
        assert!(matches!(
            machine.transition_to(to),
            Err(TransitionError::TerminalState { from: Synced, .. })
        ));
    }
}

#[test]
fn test_happy_path_lifecycle() {
    let mut machine = SaleStateMachine::default();
    for next in [AwaitingPayment, Paid, Synced] {
        machine.transition_to(next).unwrap();
    }
    assert_eq!(machine.current_status(), Synced);
}

#[test]
fn test_pending_sync_has_no_way_out() {
    let mut machine = SaleStateMachine::new(PaidPendingSync);
    for to in SaleStatus::ALL {
        assert!(matches!(
            machine.transition_to(to),
            Err(TransitionError::InvalidTransition { .. })
        ));
    }
    assert_eq!(machine.current_status(), PaidPendingSync);
}

#[test]
fn test_created_cannot_be_canceled_directly() {
    let mut machine = SaleStateMachine::new(Created);
    assert_eq!(
        machine.transition_to(Canceled),
        Err(TransitionError::InvalidTransition {
            from: Created,
            to: Canceled
        })
    );
}

#[test]
fn test_self_transitions_are_invalid() {
    for status in [Created, AwaitingPayment, Paid, PaidPendingSync] {
        let mut machine = SaleStateMachine::new(status);
        assert!(matches!(
            machine.transition_to(status),
            Err(TransitionError::InvalidTransition { .. })
        ));
    }
}
