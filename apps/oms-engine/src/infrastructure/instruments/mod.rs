//! Instrument Resolution Adapters
//!
//! Implementations of `InstrumentResolverPort`.

pub mod static_resolver;

pub use static_resolver::StaticInstrumentResolver;
