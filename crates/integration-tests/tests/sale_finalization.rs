//! Integration tests for the session to sale workflow.
//!
//! These run the real `SaleService` against in-memory collaborators, so no
//! database is needed.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use saleflow_api::services::sales::{Finalization, SaleError, SaleService};
use saleflow_core::{CustomerId, SaleId, SaleStatus, SessionId, SessionStatus};
use saleflow_integration_tests::{InMemorySales, InMemorySessions, cart_line, session};

fn service() -> (
    SaleService<InMemorySessions, InMemorySales>,
    InMemorySessions,
    InMemorySales,
) {
    let sessions = InMemorySessions::new();
    let sales = InMemorySales::new();
    let service = SaleService::new(sessions.clone(), sales.clone());
    (service, sessions, sales)
}

fn s1() -> SessionId {
    SessionId::new("s1")
}

fn u1() -> CustomerId {
    CustomerId::new("u1")
}

fn closed_s1() -> saleflow_core::Session {
    session(
        "s1",
        "u1",
        SessionStatus::Closed,
        vec![cart_line("P1", 1, Decimal::from(100))],
    )
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_closed_session_becomes_created_sale() {
    let (service, sessions, sales) = service();
    sessions.insert(closed_s1());

    let sale = service.create_sale_from_session(&s1(), &u1()).await.unwrap();

    assert_eq!(sale.status(), SaleStatus::Created);
    assert_eq!(sale.total(), Decimal::from(100));
    assert_eq!(sale.session_id(), &s1());
    assert_eq!(sale.customer_id(), &u1());
    assert_eq!(sale.items().len(), 1);
    assert_eq!(sale.items()[0].product_code.as_str(), "P1");
    assert_eq!(sale.items()[0].line_total, Decimal::from(100));
    assert_eq!(sales.writes(), 1);
}

#[tokio::test]
async fn test_repeat_call_returns_same_sale_with_one_write() {
    let (service, sessions, sales) = service();
    sessions.insert(closed_s1());

    let first = service.create_sale_from_session(&s1(), &u1()).await.unwrap();
    let second = service.create_sale_from_session(&s1(), &u1()).await.unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(first, second);
    assert_eq!(sales.writes(), 1);
    assert_eq!(sales.len(), 1);
}

#[tokio::test]
async fn test_finalize_reports_created_then_existing() {
    let (service, sessions, sales) = service();
    sessions.insert(closed_s1());

    let first = service.finalize_session(&s1(), &u1()).await.unwrap();
    let second = service.finalize_session(&s1(), &u1()).await.unwrap();

    assert!(first.is_created());
    let first = first.into_sale();
    assert!(matches!(second, Finalization::Existing(sale) if sale.id() == first.id()));
    assert_eq!(sales.writes(), 1);
}

#[tokio::test]
async fn test_sale_is_a_snapshot_of_the_cart() {
    let (service, sessions, _sales) = service();
    sessions.insert(closed_s1());

    let sale = service.create_sale_from_session(&s1(), &u1()).await.unwrap();

    sessions.update(&s1(), |session| {
        session.cart.push(cart_line("P2", 2, Decimal::from(50)));
        session.cart[0].quantity = 7;
        session.total = Decimal::from(999);
    });

    let stored = service.get_sale(sale.id(), &u1()).await.unwrap();
    assert_eq!(stored.items().len(), 1);
    assert_eq!(stored.items()[0].quantity, 1);
    assert_eq!(stored.total(), Decimal::from(100));
}

// =============================================================================
// Guards
// =============================================================================

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let (service, _sessions, sales) = service();

    let err = service
        .create_sale_from_session(&SessionId::new("missing"), &u1())
        .await
        .unwrap_err();

    assert!(matches!(err, SaleError::SessionNotFound(id) if id.as_str() == "missing"));
    assert!(sales.is_empty());
}

#[tokio::test]
async fn test_ownership_mismatch_fails_for_every_status() {
    for status in [
        SessionStatus::Active,
        SessionStatus::Closed,
        SessionStatus::Abandoned,
    ] {
        let (service, sessions, sales) = service();
        sessions.insert(session(
            "s1",
            "u1",
            status,
            vec![cart_line("P1", 1, Decimal::from(100))],
        ));

        let err = service
            .create_sale_from_session(&s1(), &CustomerId::new("intruder"))
            .await
            .unwrap_err();

        assert!(
            matches!(err, SaleError::SessionNotOwned),
            "status {status} should fail ownership first, got {err:?}"
        );
        assert_eq!(sales.writes(), 0);
    }
}

#[tokio::test]
async fn test_non_closed_session_is_rejected_without_writes() {
    for status in [SessionStatus::Active, SessionStatus::Abandoned] {
        let (service, sessions, sales) = service();
        sessions.insert(session(
            "s1",
            "u1",
            status,
            vec![cart_line("P1", 1, Decimal::from(100))],
        ));

        let err = service.create_sale_from_session(&s1(), &u1()).await.unwrap_err();

        assert!(matches!(err, SaleError::SessionNotClosed(s) if s == status));
        assert_eq!(sales.writes(), 0);
    }
}

#[tokio::test]
async fn test_empty_closed_session_creates_zero_total_sale() {
    let (service, sessions, _sales) = service();
    sessions.insert(session("s1", "u1", SessionStatus::Closed, Vec::new()));

    let sale = service.create_sale_from_session(&s1(), &u1()).await.unwrap();

    assert!(sale.items().is_empty());
    assert_eq!(sale.total(), Decimal::ZERO);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_calls_converge_on_one_sale() {
    let (service, sessions, sales) = service();
    sessions.insert(closed_s1());

    let (s1_id, u1_id) = (s1(), u1());
    let (a, b) = tokio::join!(
        service.create_sale_from_session(&s1_id, &u1_id),
        service.create_sale_from_session(&s1_id, &u1_id),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id(), b.id());
    assert_eq!(sales.writes(), 1);
    assert_eq!(sales.len(), 1);
}

#[tokio::test]
async fn test_conflict_on_insert_returns_the_winner() {
    let (service, sessions, sales) = service();
    sessions.insert(closed_s1());

    let winner = service.create_sale_from_session(&s1(), &u1()).await.unwrap();

    // The existence check misses, so the insert hits the uniqueness rule.
    sales.miss_next_session_lookups(1);
    let loser = service.finalize_session(&s1(), &u1()).await.unwrap();

    assert!(!loser.is_created());
    assert_eq!(winner.id(), loser.into_sale().id());
    assert_eq!(sales.writes(), 1);
}

#[tokio::test]
async fn test_many_parallel_tasks_create_one_sale() {
    let (service, sessions, sales) = service();
    sessions.insert(closed_s1());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.create_sale_from_session(&s1(), &u1()).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id());
    }

    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(sales.writes(), 1);
}

// =============================================================================
// Reading sales
// =============================================================================

#[tokio::test]
async fn test_get_sale_checks_owner() {
    let (service, sessions, _sales) = service();
    sessions.insert(closed_s1());
    let sale = service.create_sale_from_session(&s1(), &u1()).await.unwrap();

    assert_eq!(service.get_sale(sale.id(), &u1()).await.unwrap(), sale);
    assert!(matches!(
        service.get_sale(sale.id(), &CustomerId::new("u2")).await,
        Err(SaleError::SaleNotOwned)
    ));
}

#[tokio::test]
async fn test_get_unknown_sale_is_not_found() {
    let (service, _sessions, _sales) = service();
    let id = SaleId::generate();

    assert!(matches!(
        service.get_sale(id, &u1()).await,
        Err(SaleError::SaleNotFound(missing)) if missing == id
    ));
}
