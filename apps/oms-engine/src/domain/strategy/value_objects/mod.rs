//! Strategy Value Objects

mod leg;
mod state;

pub use leg::{Leg, LegSlot};
pub use state::{PendingAdjustment, StranglePhase, StrangleState};
