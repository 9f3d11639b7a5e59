//! Fixed market data source.
//!
//! Serves whatever chain contracts and quotes were loaded into it. Used for
//! dry runs and strategy tests where the chain must be scripted.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::application::ports::{
    MarketDataError, MarketDataPort, MarketSnapshot, OptionKind, OptionQuote,
};
use crate::domain::shared::Symbol;

#[derive(Debug, Default)]
struct FixedState {
    spot: Option<Decimal>,
    nearest_call: Option<OptionQuote>,
    nearest_put: Option<OptionQuote>,
    quotes: HashMap<String, OptionQuote>,
}

/// Market data source backed by preset values.
#[derive(Debug, Default)]
pub struct FixedMarketData {
    state: RwLock<FixedState>,
}

impl FixedMarketData {
    /// An empty source. Lookups fail until values are set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FixedState::default()),
        }
    }

    /// Set the underlying spot.
    pub fn set_spot(&self, spot: Decimal) {
        self.state.write().spot = Some(spot);
    }

    /// Set the contract returned for nearest-delta lookups of `kind`.
    pub fn set_nearest(&self, kind: OptionKind, quote: OptionQuote) {
        let mut state = self.state.write();
        match kind {
            OptionKind::Call => state.nearest_call = Some(quote),
            OptionKind::Put => state.nearest_put = Some(quote),
        }
    }

    /// Set the live quote for a contract, keyed by its symbol.
    pub fn set_quote(&self, quote: OptionQuote) {
        self.state
            .write()
            .quotes
            .insert(quote.symbol.as_str().to_string(), quote);
    }
}

#[async_trait]
impl MarketDataPort for FixedMarketData {
    async fn nearest_option(
        &self,
        target_delta: Decimal,
        kind: OptionKind,
    ) -> Result<OptionQuote, MarketDataError> {
        let state = self.state.read();
        let quote = match kind {
            OptionKind::Call => state.nearest_call.clone(),
            OptionKind::Put => state.nearest_put.clone(),
        };
        quote.ok_or(MarketDataError::NoContract { target_delta, kind })
    }

    async fn quote(&self, symbol: &Symbol) -> Result<OptionQuote, MarketDataError> {
        self.state
            .read()
            .quotes
            .get(symbol.as_str())
            .cloned()
            .ok_or_else(|| MarketDataError::Unavailable {
                message: format!("no quote for {symbol}"),
            })
    }

    async fn snapshot(&self) -> Result<MarketSnapshot, MarketDataError> {
        self.state
            .read()
            .spot
            .map(|spot| MarketSnapshot { spot })
            .ok_or_else(|| MarketDataError::Unavailable {
                message: "no spot loaded".to_string(),
            })
    }
}
