//! Order Intent Value Objects
//!
//! Immutable types describing what an intent is and where an order
//! record sits in its lifecycle.

mod execution_type;
mod logical_key;
mod order_kind;
mod order_status;
mod side;
mod source;

pub use execution_type::ExecutionType;
pub use logical_key::LogicalKey;
pub use order_kind::OrderKind;
pub use order_status::OrderStatus;
pub use side::Side;
pub use source::IntentSource;
