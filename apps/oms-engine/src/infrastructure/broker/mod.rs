//! Broker Adapters
//!
//! Implementations of `BrokerPort`. The paper broker simulates fills and
//! positions in memory for tests and dry runs.

pub mod paper;

pub use paper::PaperBroker;
