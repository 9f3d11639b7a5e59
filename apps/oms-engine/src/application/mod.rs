//! Application Layer
//!
//! Orchestration between the domain and the outside world: ports describe
//! what the engine needs from brokers, market data and audit storage;
//! services run the pipeline, the watcher, risk supervision and the
//! strategy on top of those ports.

pub mod ports;
pub mod services;
