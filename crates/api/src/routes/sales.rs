//! Sale routes.
//!
//! JSON endpoints for finalizing sessions into sales and reading them back.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::instrument;

use saleflow_core::{Sale, SaleId, SaleStatus, SessionId};

use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::state::AppState;

/// A sale plus the statuses it may move to next.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleView {
    #[serde(flatten)]
    pub sale: Sale,
    pub allowed_transitions: Vec<SaleStatus>,
}

impl From<Sale> for SaleView {
    fn from(sale: Sale) -> Self {
        let allowed_transitions = SaleStatus::ALL
            .into_iter()
            .filter(|target| sale.can_transition_to(*target).is_ok())
            .collect();

        Self {
            sale,
            allowed_transitions,
        }
    }
}

/// Finalize a closed session into a sale.
///
/// POST /sales/from-session/{session_id}
///
/// Repeating the call for the same session returns the same sale: 201 when
/// this call created it, 200 when it already existed.
///
/// # Errors
///
/// Returns `AppError` if the session is missing, owned by someone else,
/// not closed, or persistence fails.
#[instrument(skip_all, fields(session_id = %session_id, customer_id = %customer_id))]
pub async fn create_from_session(
    State(state): State<AppState>,
    RequireCustomer(customer_id): RequireCustomer,
    Path(session_id): Path<SessionId>,
) -> Result<(StatusCode, Json<SaleView>)> {
    let outcome = state
        .sales()
        .finalize_session(&session_id, &customer_id)
        .await?;

    let status = if outcome.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(outcome.into_sale().into())))
}

/// Get a sale owned by the caller.
///
/// GET /sales/{id}
///
/// # Errors
///
/// Returns `AppError` if the sale is missing or owned by someone else.
#[instrument(skip_all, fields(sale_id = %sale_id, customer_id = %customer_id))]
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(customer_id): RequireCustomer,
    Path(sale_id): Path<SaleId>,
) -> Result<Json<SaleView>> {
    let sale = state.sales().get_sale(sale_id, &customer_id).await?;
    Ok(Json(sale.into()))
}

/// Check whether a sale may move to `target`.
///
/// GET /sales/{id}/transitions/{target}
///
/// Answers 204 when allowed and 409 with the reason when not. Nothing is
/// persisted.
///
/// # Errors
///
/// Returns `AppError::Transition` if the state machine refuses the change.
#[instrument(skip_all, fields(sale_id = %sale_id, target = %target, customer_id = %customer_id))]
pub async fn check_transition(
    State(state): State<AppState>,
    RequireCustomer(customer_id): RequireCustomer,
    Path((sale_id, target)): Path<(SaleId, String)>,
) -> Result<StatusCode> {
    let target: SaleStatus = target.parse().map_err(AppError::BadRequest)?;
    let sale = state.sales().get_sale(sale_id, &customer_id).await?;

    sale.can_transition_to(target)?;
    Ok(StatusCode::NO_CONTENT)
}
