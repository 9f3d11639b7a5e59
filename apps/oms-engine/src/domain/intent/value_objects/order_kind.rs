//! Order kind (market, limit, stop variants).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order kind, named the way Indian brokers name them.
///
/// SL is a stop-limit (trigger + limit price), SL-M a stop-market
/// (trigger only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Market order.
    #[serde(rename = "MARKET")]
    Market,
    /// Limit order.
    #[serde(rename = "LIMIT")]
    Limit,
    /// Stop-limit order.
    #[serde(rename = "SL")]
    StopLimit,
    /// Stop-market order.
    #[serde(rename = "SL-M")]
    StopMarket,
}

impl OrderKind {
    /// String form as brokers expect it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::StopLimit => "SL",
            Self::StopMarket => "SL-M",
        }
    }

    /// Whether this kind requires a limit price.
    #[must_use]
    pub const fn requires_price(&self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit)
    }

    /// Whether this kind requires a trigger price.
    #[must_use]
    pub const fn requires_trigger(&self) -> bool {
        matches!(self, Self::StopLimit | Self::StopMarket)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
