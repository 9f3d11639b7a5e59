//! Exit trigger value object.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position must be flattened.
///
/// Carried onto the resulting EXIT intent's trace so the audit trail shows
/// which rule fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitTrigger {
    /// Hard stop-loss level crossed.
    StopLoss {
        /// The configured level.
        level: Decimal,
    },
    /// Profit target level crossed.
    Target {
        /// The configured level.
        level: Decimal,
    },
    /// Trailing stop level crossed.
    TrailingStop {
        /// The level at the moment of breach.
        level: Decimal,
    },
    /// Position held longer than the configured maximum.
    TimeStop {
        /// How long the position was held, in seconds.
        held_secs: i64,
    },
    /// Hard end-of-day square-off time reached.
    SquareOff,
    /// The risk manager ordered all positions flat.
    RiskBreach {
        /// Which limit tripped.
        reason: String,
    },
    /// The strategy decided to exit (profit step, unwind, shutdown).
    StrategyExit {
        /// Strategy-supplied reason.
        reason: String,
    },
}

impl ExitTrigger {
    /// True for price-level triggers (stop, target, trailing).
    #[must_use]
    pub const fn is_price_trigger(&self) -> bool {
        matches!(
            self,
            Self::StopLoss { .. } | Self::Target { .. } | Self::TrailingStop { .. }
        )
    }

    /// True for clock-driven triggers.
    #[must_use]
    pub const fn is_time_trigger(&self) -> bool {
        matches!(self, Self::TimeStop { .. } | Self::SquareOff)
    }
}

impl fmt::Display for ExitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopLoss { level } => write!(f, "STOP_LOSS@{level}"),
            Self::Target { level } => write!(f, "TARGET@{level}"),
            Self::TrailingStop { level } => write!(f, "TRAILING_STOP@{level}"),
            Self::TimeStop { held_secs } => write!(f, "TIME_STOP after {held_secs}s"),
            Self::SquareOff => write!(f, "SQUARE_OFF"),
            Self::RiskBreach { reason } => write!(f, "RISK_BREACH: {reason}"),
            Self::StrategyExit { reason } => write!(f, "STRATEGY_EXIT: {reason}"),
        }
    }
}
