//! Persistence Adapters
//!
//! Repository and trace sink implementations. SQLite is the durable store;
//! the in-memory variants back unit tests and dry runs.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::{InMemoryOrderRepository, InMemoryTraceSink};
pub use sqlite::{SqliteOrderRepository, SqliteRunStore, SqliteTraceStore, connect};
