//! Market Data Port (Driven Port)
//!
//! Interface for option-chain lookups used to pick strangle legs. The
//! engine trusts the returned contract details verbatim.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::shared::Symbol;

/// Option right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionKind {
    /// Call option.
    Call,
    /// Put option.
    Put,
}

/// A chain contract selected by delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Tradeable contract symbol.
    pub symbol: Symbol,
    /// Current delta of the contract.
    pub delta: Decimal,
    /// Last traded premium.
    pub price: Decimal,
}

/// Spot snapshot of the underlying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Underlying spot price.
    pub spot: Decimal,
}

/// Market data port error.
#[derive(Debug, Clone, Error)]
pub enum MarketDataError {
    /// No contract near the requested delta.
    #[error("No contract near delta {target_delta} for {kind:?}")]
    NoContract {
        /// Requested delta.
        target_delta: Decimal,
        /// Requested right.
        kind: OptionKind,
    },

    /// Provider unavailable.
    #[error("Market data unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },
}

/// Port for option chain and spot lookups.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Contract of the given right closest to `target_delta` in magnitude.
    async fn nearest_option(
        &self,
        target_delta: Decimal,
        kind: OptionKind,
    ) -> Result<OptionQuote, MarketDataError>;

    /// Current quote for a held contract.
    async fn quote(&self, symbol: &Symbol) -> Result<OptionQuote, MarketDataError>;

    /// Current underlying spot.
    async fn snapshot(&self) -> Result<MarketSnapshot, MarketDataError>;
}
