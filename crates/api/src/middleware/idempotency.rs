//! Idempotency guard middleware for commit-once routes.
//!
//! The token comes from the [`IDEMPOTENCY_KEY_HEADER`] header, falling back
//! to an `idempotencyKey` field in a JSON body. Requests without a token pass
//! through untouched. A token that is still remembered rejects the request
//! with 409 before the handler runs.
//!
//! A response that says nothing about the request itself releases the token
//! instead of recording it: 401 (no identity yet) and every 5xx. Any other
//! final status keeps the token rejected for the full TTL.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::services::idempotency::{Admission, IdempotencyGuard, IdempotencyToken};

/// The HTTP header name for idempotency tokens.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Largest body buffered while looking for a token field.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdempotencyEnvelope {
    idempotency_key: Option<String>,
}

/// Admit or reject a request by its idempotency token.
///
/// The body is buffered only when the header is absent, and is handed to the
/// handler unchanged.
pub async fn idempotency_middleware(
    State(guard): State<IdempotencyGuard>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(IdempotencyToken::parse);

    let (token, request) = match header {
        Some(token) => (Some(token), request),
        None => match token_from_body(request).await {
            Ok(found) => found,
            Err(err) => return err.into_response(),
        },
    };

    if guard.admit(token.as_ref()).await == Admission::Rejected {
        return AppError::Conflict("duplicate request for this idempotency key".to_string())
            .into_response();
    }

    let response = next.run(request).await;

    if let Some(token) = token {
        let status = response.status();
        if releases_token(status) {
            guard.release(&token).await;
        } else {
            guard.complete(&token, status.as_u16()).await;
        }
    }

    response
}

fn releases_token(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status.is_server_error()
}

async fn token_from_body(
    request: Request,
) -> Result<(Option<IdempotencyToken>, Request), AppError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::BadRequest("request body too large".to_string()))?;

    // Bodies that are not JSON objects simply carry no token.
    let envelope: IdempotencyEnvelope = serde_json::from_slice(&bytes).unwrap_or_default();
    let token = IdempotencyToken::resolve(None, envelope.idempotency_key.as_deref());

    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_token_for_unauthorized_and_server_errors() {
        assert!(releases_token(StatusCode::UNAUTHORIZED));
        assert!(releases_token(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(releases_token(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn test_keeps_token_for_handled_outcomes() {
        for status in [
            StatusCode::OK,
            StatusCode::CREATED,
            StatusCode::BAD_REQUEST,
            StatusCode::NOT_FOUND,
            StatusCode::CONFLICT,
        ] {
            assert!(!releases_token(status), "{status}");
        }
    }
}
