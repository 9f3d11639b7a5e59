//! Shared Value Objects
//!
//! Immutable domain types used across bounded contexts.
//! Value objects are compared by value, not identity.

mod exchange;
mod identifiers;
mod product;
mod symbol;
mod timestamp;

pub use exchange::Exchange;
pub use identifiers::{BrokerOrderId, ClientId, CommandId, RunId};
pub use product::Product;
pub use symbol::Symbol;
pub use timestamp::Timestamp;
