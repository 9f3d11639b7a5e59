//! Market Data Adapters
//!
//! Implementations of `MarketDataPort`.

pub mod fixed;

pub use fixed::FixedMarketData;
