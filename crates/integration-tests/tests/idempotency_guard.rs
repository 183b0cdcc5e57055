//! Integration tests for the idempotency guard and its middleware.
//!
//! Time is driven by a `ManualClock`, so TTL expiry needs no sleeping.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    routing::post,
};
use chrono::Duration;
use serde_json::Value;
use tower::ServiceExt;

use saleflow_api::config::DEFAULT_IDEMPOTENCY_TTL_SECS;
use saleflow_api::middleware::{IDEMPOTENCY_KEY_HEADER, idempotency_middleware};
use saleflow_api::services::idempotency::{
    Admission, ExpiringCache, IdempotencyGuard, IdempotencyRecord, IdempotencyToken,
};
use saleflow_core::clock::ManualClock;
use saleflow_integration_tests::test_clock;

fn guard(clock: &ManualClock) -> IdempotencyGuard {
    let cache = ExpiringCache::new(Arc::new(clock.clone()));
    IdempotencyGuard::new(cache, DEFAULT_IDEMPOTENCY_TTL_SECS)
}

fn token(raw: &str) -> IdempotencyToken {
    IdempotencyToken::parse(raw).unwrap()
}

fn ttl() -> Duration {
    Duration::seconds(i64::try_from(DEFAULT_IDEMPOTENCY_TTL_SECS).unwrap())
}

// =============================================================================
// Guard
// =============================================================================

#[tokio::test]
async fn test_fresh_token_admitted_then_repeat_rejected() {
    let clock = test_clock();
    let guard = guard(&clock);
    let key = token("uuid-1");

    assert_eq!(guard.admit(Some(&key)).await, Admission::Admitted);
    assert_eq!(guard.record(&key).await, Some(IdempotencyRecord::Processing));
    assert_eq!(guard.admit(Some(&key)).await, Admission::Rejected);
}

#[tokio::test]
async fn test_token_admitted_again_after_ttl() {
    let clock = test_clock();
    let guard = guard(&clock);
    let key = token("uuid-1");

    assert_eq!(guard.admit(Some(&key)).await, Admission::Admitted);

    clock.advance(ttl() - Duration::seconds(1));
    assert_eq!(guard.admit(Some(&key)).await, Admission::Rejected);

    clock.advance(Duration::seconds(1));
    assert_eq!(guard.admit(Some(&key)).await, Admission::Admitted);
}

#[tokio::test]
async fn test_missing_token_always_admitted() {
    let clock = test_clock();
    let guard = guard(&clock);

    assert_eq!(guard.admit(None).await, Admission::Admitted);
    assert_eq!(guard.admit(None).await, Admission::Admitted);
}

#[tokio::test]
async fn test_completed_token_still_rejected() {
    let clock = test_clock();
    let guard = guard(&clock);
    let key = token("uuid-1");

    guard.admit(Some(&key)).await;
    guard.complete(&key, 201).await;

    assert_eq!(
        guard.record(&key).await,
        Some(IdempotencyRecord::Completed { http_status: 201 })
    );
    assert_eq!(guard.admit(Some(&key)).await, Admission::Rejected);
}

#[tokio::test]
async fn test_distinct_tokens_are_independent() {
    let clock = test_clock();
    let guard = guard(&clock);

    assert_eq!(guard.admit(Some(&token("a"))).await, Admission::Admitted);
    assert_eq!(guard.admit(Some(&token("b"))).await, Admission::Admitted);
}

#[tokio::test]
async fn test_concurrent_admissions_admit_exactly_one() {
    let clock = test_clock();
    let guard = guard(&clock);

    let mut handles = Vec::new();
    for _ in 0..32 {
        let guard = guard.clone();
        handles.push(tokio::spawn(async move {
            guard.admit(Some(&token("race"))).await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() == Admission::Admitted {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
}

#[tokio::test]
async fn test_live_tokens_stay_rejected_under_volume() {
    let clock = test_clock();
    let guard = guard(&clock);
    let tokens: Vec<_> = (0..2_000).map(|i| token(&format!("bulk-{i}"))).collect();

    for key in &tokens {
        assert_eq!(guard.admit(Some(key)).await, Admission::Admitted);
    }
    for key in tokens.iter().take(100) {
        guard.complete(key, 201).await;
    }

    let readmitted = count_admitted(&guard, &tokens).await;
    assert_eq!(readmitted, 0);
}

async fn count_admitted(guard: &IdempotencyGuard, tokens: &[IdempotencyToken]) -> usize {
    let mut admitted = 0;
    for key in tokens {
        if guard.admit(Some(key)).await == Admission::Admitted {
            admitted += 1;
        }
    }
    admitted
}

#[tokio::test]
async fn test_released_token_is_admitted_again() {
    let clock = test_clock();
    let guard = guard(&clock);
    let key = token("uuid-1");

    guard.admit(Some(&key)).await;
    guard.release(&key).await;

    assert_eq!(guard.record(&key).await, None);
    assert_eq!(guard.admit(Some(&key)).await, Admission::Admitted);
}

// =============================================================================
// Middleware
// =============================================================================

/// Router with a counting handler behind the guard.
fn app(guard: IdempotencyGuard, calls: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/commit",
        post(move |body: String| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                (StatusCode::CREATED, body)
            }
        })
        .route_layer(from_fn_with_state(guard, idempotency_middleware)),
    )
}

fn request(header: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/commit")
        .header("content-type", "application/json");
    if let Some(key) = header {
        builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

#[tokio::test]
async fn test_header_token_blocks_duplicate_request() {
    let clock = test_clock();
    let guard = guard(&clock);
    let calls = Arc::new(AtomicUsize::new(0));

    let first = app(guard.clone(), Arc::clone(&calls))
        .oneshot(request(Some("k-1"), "{}"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app(guard.clone(), Arc::clone(&calls))
        .oneshot(request(Some("k-1"), "{}"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("idempotency"));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        guard.record(&token("k-1")).await,
        Some(IdempotencyRecord::Completed { http_status: 201 })
    );
}

#[tokio::test]
async fn test_body_token_is_used_and_body_is_preserved() {
    let clock = test_clock();
    let guard = guard(&clock);
    let calls = Arc::new(AtomicUsize::new(0));
    let payload = r#"{"idempotencyKey":"body-1","note":"hello"}"#;

    let first = app(guard.clone(), Arc::clone(&calls))
        .oneshot(request(None, payload))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let echoed = to_bytes(first.into_body(), usize::MAX).await.unwrap();
    assert_eq!(echoed, payload.as_bytes());

    let second = app(guard.clone(), Arc::clone(&calls))
        .oneshot(request(None, payload))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_header_takes_precedence_over_body() {
    let clock = test_clock();
    let guard = guard(&clock);
    let calls = Arc::new(AtomicUsize::new(0));

    app(guard.clone(), Arc::clone(&calls))
        .oneshot(request(Some("from-header"), r#"{"idempotencyKey":"from-body"}"#))
        .await
        .unwrap();

    assert!(guard.record(&token("from-header")).await.is_some());
    assert!(guard.record(&token("from-body")).await.is_none());

    // The body token was never recorded, so it is still fresh.
    let response = app(guard, Arc::clone(&calls))
        .oneshot(request(None, r#"{"idempotencyKey":"from-body"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_requests_without_token_always_pass() {
    let clock = test_clock();
    let guard = guard(&clock);
    let calls = Arc::new(AtomicUsize::new(0));

    for body in ["", "{}", "not json", r#"{"idempotencyKey":"  "}"#] {
        let response = app(guard.clone(), Arc::clone(&calls))
            .oneshot(request(None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED, "body {body:?}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_token_usable_again_after_ttl() {
    let clock = test_clock();
    let guard = guard(&clock);
    let calls = Arc::new(AtomicUsize::new(0));

    app(guard.clone(), Arc::clone(&calls))
        .oneshot(request(Some("k-ttl"), "{}"))
        .await
        .unwrap();

    clock.advance(ttl());

    let response = app(guard, Arc::clone(&calls))
        .oneshot(request(Some("k-ttl"), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Router whose handler always answers with `status`.
fn app_answering(guard: IdempotencyGuard, status: StatusCode) -> Router {
    Router::new().route(
        "/commit",
        post(move || async move { status })
            .route_layer(from_fn_with_state(guard, idempotency_middleware)),
    )
}

#[tokio::test]
async fn test_unauthorized_and_server_errors_release_the_token() {
    for status in [StatusCode::UNAUTHORIZED, StatusCode::INTERNAL_SERVER_ERROR] {
        let clock = test_clock();
        let guard = guard(&clock);

        let response = app_answering(guard.clone(), status)
            .oneshot(request(Some("k-retry"), "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), status);
        assert_eq!(guard.record(&token("k-retry")).await, None, "{status}");

        let retry = app(guard, Arc::new(AtomicUsize::new(0)))
            .oneshot(request(Some("k-retry"), "{}"))
            .await
            .unwrap();
        assert_eq!(retry.status(), StatusCode::CREATED, "{status}");
    }
}

#[tokio::test]
async fn test_client_errors_keep_the_token() {
    let clock = test_clock();
    let guard = guard(&clock);

    let response = app_answering(guard.clone(), StatusCode::BAD_REQUEST)
        .oneshot(request(Some("k-bad"), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        guard.record(&token("k-bad")).await,
        Some(IdempotencyRecord::Completed { http_status: 400 })
    );

    let retry = app_answering(guard, StatusCode::CREATED)
        .oneshot(request(Some("k-bad"), "{}"))
        .await
        .unwrap();
    assert_eq!(retry.status(), StatusCode::CONFLICT);
}
