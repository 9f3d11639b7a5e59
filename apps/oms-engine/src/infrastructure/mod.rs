//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application layer:
//!
//! - **Driven (outbound)**: what the engine calls out to
//!   - `persistence/`: SQLite repository, trace store and run log
//!   - `broker/`: broker clients (paper simulation)
//!   - `market_data/`: option chain and spot lookups
//!   - `instruments/`: contract master resolution
//!
//! - **Driver (inbound)**: what calls into the engine
//!   - `http/`: REST command surface
//!
//! - `config/`: settings and the dependency container

pub mod broker;
pub mod config;
pub mod http;
pub mod instruments;
pub mod market_data;
pub mod persistence;
