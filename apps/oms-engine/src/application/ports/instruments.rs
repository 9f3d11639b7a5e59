//! Instrument Resolver Port (Driven Port)
//!
//! Resolves contract parameters the exchange dictates: expiry, lot size and
//! which order kinds the segment accepts. Resolved values are trusted
//! verbatim; the engine performs no second validation of them.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::intent::OrderKind;
use crate::domain::shared::{Exchange, Symbol};

/// Resolved contract parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInstrument {
    /// Contract expiry date.
    pub expiry: NaiveDate,
    /// Contracts per lot.
    pub lot_size: u32,
    /// Order kinds the segment accepts for this contract.
    pub order_kinds: Vec<OrderKind>,
}

impl ResolvedInstrument {
    /// Whether the segment accepts `kind` for this contract.
    #[must_use]
    pub fn accepts(&self, kind: OrderKind) -> bool {
        self.order_kinds.contains(&kind)
    }
}

/// Instrument resolver error.
#[derive(Debug, Clone, Error)]
pub enum InstrumentError {
    /// The symbol is not in the instrument master.
    #[error("Unknown instrument: {exchange}/{symbol}")]
    Unknown {
        /// Exchange segment.
        exchange: Exchange,
        /// The unresolved symbol.
        symbol: Symbol,
    },
}

/// Port for instrument master lookups.
#[async_trait]
pub trait InstrumentResolverPort: Send + Sync {
    /// Resolve contract parameters for a symbol.
    async fn resolve(
        &self,
        exchange: Exchange,
        symbol: &Symbol,
    ) -> Result<ResolvedInstrument, InstrumentError>;
}
