//! Order record status in the pipeline lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of an order record.
///
/// The lifecycle is strictly monotonic:
///
/// ```text
/// CREATED ──> SENT_TO_BROKER ──> EXECUTED
///    │               │
///    └───────────────┴─────────> FAILED
/// ```
///
/// A record never moves backwards. EXECUTED and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Persisted locally, broker call not yet made.
    Created,
    /// Accepted by the broker, awaiting confirmation.
    SentToBroker,
    /// Confirmed filled by the broker.
    Executed,
    /// Rejected, cancelled or errored. Reason kept on the record.
    Failed,
}

impl OrderStatus {
    /// Position in the monotonic lifecycle. Transitions never decrease it.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::SentToBroker => 1,
            Self::Executed | Self::Failed => 2,
        }
    }

    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Failed)
    }

    /// Returns true if the record still awaits broker resolution.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Created | Self::SentToBroker)
    }

    /// Whether a transition from `self` to `to` is legal.
    ///
    /// Same-status transitions are legal refreshes (reconciliation may
    /// re-apply fill details); anything else must follow the lifecycle
    /// graph.
    #[must_use]
    pub const fn can_transition_to(&self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Created, Self::Created | Self::SentToBroker | Self::Failed)
                | (Self::SentToBroker, Self::SentToBroker | Self::Executed | Self::Failed)
                | (Self::Executed, Self::Executed)
                | (Self::Failed, Self::Failed)
        )
    }

    /// Statuses allowed to precede a transition into `target`.
    ///
    /// Used by repositories to guard status writes atomically.
    #[must_use]
    pub const fn valid_priors(target: Self) -> &'static [Self] {
        match target {
            Self::Created => &[Self::Created],
            Self::SentToBroker => &[Self::Created, Self::SentToBroker],
            Self::Executed => &[Self::SentToBroker, Self::Executed],
            Self::Failed => &[Self::Created, Self::SentToBroker, Self::Failed],
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::SentToBroker => write!(f, "SENT_TO_BROKER"),
            Self::Executed => write!(f, "EXECUTED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}
