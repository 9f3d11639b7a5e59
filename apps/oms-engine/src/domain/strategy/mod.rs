//! Strategy Bounded Context
//!
//! Pure state and decisions for the delta-neutral short strangle: two-leg
//! bookkeeping, net delta drift detection, adjustment staging with revert,
//! profit-step and cooldown checks. Order submission lives in the
//! application layer; nothing here talks to a broker.

pub mod errors;
pub mod value_objects;

pub use errors::StrategyError;
pub use value_objects::{Leg, LegSlot, PendingAdjustment, StranglePhase, StrangleState};
