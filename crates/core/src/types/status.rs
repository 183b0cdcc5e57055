//! Status enums for sales and shopping sessions.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a finalized sale.
///
/// Transitions between these values are validated by
/// [`SaleStateMachine`](crate::state_machine::SaleStateMachine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "saleflow.sale_status", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    /// Freshly created from a closed session.
    #[default]
    Created,
    /// Presented to the customer for payment.
    AwaitingPayment,
    /// Payment captured.
    Paid,
    /// Exported to the ERP. **Terminal.**
    Synced,
    /// Paid, ERP export queued or failed transiently.
    PaidPendingSync,
    /// Abandoned before payment. **Terminal.**
    Canceled,
}

impl SaleStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Created,
        Self::AwaitingPayment,
        Self::Paid,
        Self::Synced,
        Self::PaidPendingSync,
        Self::Canceled,
    ];

    /// Returns `true` if no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Synced)
    }

    /// Stable snake_case name, matching the database enum labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Paid => "paid",
            Self::Synced => "synced",
            Self::PaidPendingSync => "paid_pending_sync",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SaleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid sale status: {s}"))
    }
}

/// Status of a shopping session, as reported by the session collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "saleflow.session_status", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Active,
    Closed,
    Abandoned,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}
