//! Exit Evaluator Domain Service

use rust_decimal::Decimal;

use crate::domain::exits::value_objects::{ExitTrigger, TrackedPosition, TrailingMode};
use crate::domain::shared::Timestamp;

/// Evaluates one tick of price and clock against a tracked position.
///
/// Trailing state is advanced before any breach check so that a fresh
/// favorable extreme from the same tick tightens the level first. At most
/// one trigger fires per call; price rules outrank time rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitEvaluator;

impl ExitEvaluator {
    /// Create a new evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Evaluate `position` against the latest traded price and wall clock.
    ///
    /// Mutates only the trailing level. Returns the trigger to act on, or
    /// `None`. Positions past `Live` are never evaluated.
    pub fn evaluate(
        &self,
        position: &mut TrackedPosition,
        last_price: Decimal,
        now: Timestamp,
    ) -> Option<ExitTrigger> {
        if !position.is_live() {
            return None;
        }

        let direction = position.levels().direction;
        let trailing = position.levels().trailing;
        if !trailing.is_off() {
            let advanced = trailing.advance(direction, position.trailing_level(), last_price);
            position.set_trailing_level(advanced);
        }

        let levels = position.levels();

        if let Some(level) = levels.stop_hit(last_price) {
            return Some(ExitTrigger::StopLoss { level });
        }

        if let Some(level) = position.trailing_level() {
            if TrailingMode::breached(direction, level, last_price) {
                return Some(ExitTrigger::TrailingStop { level });
            }
        }

        if let Some(level) = levels.target_hit(last_price) {
            return Some(ExitTrigger::Target { level });
        }

        if let Some(max_hold) = levels.max_hold {
            let held = now.duration_since(position.entered_at());
            if held >= max_hold {
                return Some(ExitTrigger::TimeStop {
                    held_secs: held.num_seconds(),
                });
            }
        }

        if let Some(square_off) = levels.square_off {
            if now.time_of_day() >= square_off {
                return Some(ExitTrigger::SquareOff);
            }
        }

        None
    }
}
