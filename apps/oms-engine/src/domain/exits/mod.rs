//! Exit Management Bounded Context
//!
//! Models positions under watch and the rules that close them: hard stops,
//! targets, trailing stops and time cutoffs. The watcher adopts executed
//! entries into [`TrackedPosition`]s and drives them Live to `ExitTriggered`
//! to Closed, with the close confirmed only by broker-reported quantities.

pub mod services;
pub mod value_objects;

pub use services::ExitEvaluator;
pub use value_objects::{
    ExitLevels, ExitTrigger, PositionDirection, PositionPhase, TrackKey, TrackedPosition,
    TrailingMode,
};
