//! Order Intent Bounded Context
//!
//! The intent pipeline: an immutable [`OrderIntent`] describes a requested
//! trading action, an [`OrderRecord`] tracks what the broker made of it.
//!
//! # Key Concepts
//!
//! - **Monotonic lifecycle**: `CREATED -> SENT_TO_BROKER -> {EXECUTED, FAILED}`,
//!   never backwards
//! - **Logical key**: the identity under which two intents count as the same
//!   action, regardless of command ID
//! - **Repository**: atomic per-record status writes, no global lock

pub mod errors;
mod intent;
mod record;
pub mod repository;
pub mod value_objects;

pub use errors::IntentError;
pub use intent::{IntentParams, OrderIntent};
pub use record::{OrderRecord, ReconstitutedRecordParams, StatusUpdate};
pub use repository::OrderRepository;
pub use value_objects::{ExecutionType, IntentSource, LogicalKey, OrderKind, OrderStatus, Side};
