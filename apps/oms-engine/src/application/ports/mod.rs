//! Application Ports
//!
//! Driven-side interfaces the engine depends on. Adapters live in the
//! infrastructure layer; tests substitute hand-rolled fakes.

mod broker;
mod instruments;
mod market_data;
mod trace;

pub use broker::{
    BrokerError, BrokerOrder, BrokerOrderStatus, BrokerPort, BrokerPosition, PlaceOrderParams,
};
pub use instruments::{InstrumentError, InstrumentResolverPort, ResolvedInstrument};
pub use market_data::{MarketDataError, MarketDataPort, MarketSnapshot, OptionKind, OptionQuote};
pub use trace::{TraceError, TraceEvent, TraceSinkPort, TraceStage};
