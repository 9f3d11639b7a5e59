//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//! This layer defines:
//!
//! - **Value Objects**: Immutable domain types with equality by value
//! - **Entities**: Records with identity and guarded state transitions
//! - **Domain Services**: Stateless business logic
//! - **Repository Traits**: Persistence abstractions (implemented in adapters)
//!
//! # Bounded Contexts
//!
//! - [`intent`]: Order intents, records and the monotonic status lifecycle
//! - [`exits`]: Watched positions, exit levels, trailing stops and triggers
//! - [`risk`]: Per-client daily limits and loss-breach assessment
//! - [`strategy`]: Delta-neutral strangle state machine and drift decisions

pub mod exits;
pub mod intent;
pub mod risk;
pub mod shared;
pub mod strategy;
