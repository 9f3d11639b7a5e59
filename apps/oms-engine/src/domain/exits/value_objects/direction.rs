//! Position direction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionDirection {
    /// Net long: profits when price rises.
    Long,
    /// Net short: profits when price falls.
    Short,
}

impl PositionDirection {
    /// Direction implied by a broker net quantity. Flat positions have none.
    #[must_use]
    pub const fn from_net_qty(net_qty: i64) -> Option<Self> {
        if net_qty > 0 {
            Some(Self::Long)
        } else if net_qty < 0 {
            Some(Self::Short)
        } else {
            None
        }
    }

    /// Sign for PnL arithmetic: long +1, short -1.
    #[must_use]
    pub const fn sign(&self) -> i64 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }
}

impl fmt::Display for PositionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}
