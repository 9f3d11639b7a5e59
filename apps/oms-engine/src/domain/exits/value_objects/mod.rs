//! Exit Management Value Objects

mod direction;
mod levels;
mod tracked_position;
mod trailing;
mod trigger;

pub use direction::PositionDirection;
pub use levels::ExitLevels;
pub use tracked_position::{PositionPhase, TrackKey, TrackedPosition};
pub use trailing::TrailingMode;
pub use trigger::ExitTrigger;
