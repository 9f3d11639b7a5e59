//! Static instrument resolver.
//!
//! Resolves from a table registered at startup instead of a live instrument
//! master download. Used for dry runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{InstrumentError, InstrumentResolverPort, ResolvedInstrument};
use crate::domain::shared::{Exchange, Symbol};

/// Resolver backed by a registered table.
#[derive(Debug, Default)]
pub struct StaticInstrumentResolver {
    entries: RwLock<HashMap<(Exchange, String), ResolvedInstrument>>,
}

impl StaticInstrumentResolver {
    /// An empty resolver. Lookups fail until entries are registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register contract parameters for a symbol.
    pub fn register(&self, exchange: Exchange, symbol: Symbol, resolved: ResolvedInstrument) {
        self.entries
            .write()
            .insert((exchange, symbol.as_str().to_string()), resolved);
    }
}

#[async_trait]
impl InstrumentResolverPort for StaticInstrumentResolver {
    async fn resolve(
        &self,
        exchange: Exchange,
        symbol: &Symbol,
    ) -> Result<ResolvedInstrument, InstrumentError> {
        self.entries
            .read()
            .get(&(exchange, symbol.as_str().to_string()))
            .cloned()
            .ok_or_else(|| InstrumentError::Unknown {
                exchange,
                symbol: symbol.clone(),
            })
    }
}
