//! Risk assessment verdict types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single limit breach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBreach {
    /// Daily PnL fell through the configured loss limit.
    DailyLossBreached {
        /// Observed daily PnL.
        daily_pnl: Decimal,
        /// Configured loss magnitude.
        limit: Decimal,
    },
    /// Too many position slots already open.
    PositionCapExceeded {
        /// Observed open slot count.
        open_positions: u32,
        /// Configured cap.
        limit: u32,
    },
    /// The per-day order budget is used up.
    OrderBudgetExhausted {
        /// Orders placed so far today.
        orders_today: u32,
        /// Configured budget.
        limit: u32,
    },
}

impl fmt::Display for RiskBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DailyLossBreached { daily_pnl, limit } => {
                write!(f, "daily loss breached: pnl {daily_pnl} against limit -{limit}")
            }
            Self::PositionCapExceeded {
                open_positions,
                limit,
            } => {
                write!(f, "position cap exceeded: {open_positions} open, cap {limit}")
            }
            Self::OrderBudgetExhausted {
                orders_today,
                limit,
            } => {
                write!(f, "order budget exhausted: {orders_today} of {limit} used")
            }
        }
    }
}

/// Outcome of a risk assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    /// Whether new exposure may be opened.
    pub clear: bool,
    /// Breaches found, empty when clear.
    pub breaches: Vec<RiskBreach>,
}

impl RiskVerdict {
    /// A verdict with no breaches.
    #[must_use]
    pub const fn clear() -> Self {
        Self {
            clear: true,
            breaches: Vec::new(),
        }
    }

    /// Build a verdict from breaches, clear only when none.
    #[must_use]
    pub fn from_breaches(breaches: Vec<RiskBreach>) -> Self {
        Self {
            clear: breaches.is_empty(),
            breaches,
        }
    }

    /// Whether the daily loss limit is among the breaches.
    #[must_use]
    pub fn loss_breached(&self) -> bool {
        self.breaches
            .iter()
            .any(|b| matches!(b, RiskBreach::DailyLossBreached { .. }))
    }
}

impl Default for RiskVerdict {
    fn default() -> Self {
        Self::clear()
    }
}
