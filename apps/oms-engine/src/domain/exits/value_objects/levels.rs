//! Exit levels attached to a watched position.

use chrono::{Duration, NaiveTime};
use rust_decimal::Decimal;

use super::direction::PositionDirection;
use super::trailing::TrailingMode;

/// The exit rules the watcher enforces for one position.
///
/// Levels come from the originating entry intent and the strategy
/// configuration; the watcher never invents them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitLevels {
    /// Direction of the position the levels protect.
    pub direction: PositionDirection,
    /// Average entry price, the anchor for PnL-style checks.
    pub entry_price: Decimal,
    /// Hard stop-loss level.
    pub stop_loss: Option<Decimal>,
    /// Profit target level.
    pub target: Option<Decimal>,
    /// Trailing stop behavior.
    pub trailing: TrailingMode,
    /// Maximum holding time before a time stop fires.
    pub max_hold: Option<Duration>,
    /// Hard end-of-day cutoff (UTC wall clock).
    pub square_off: Option<NaiveTime>,
}

impl ExitLevels {
    /// Levels with only a hard stop and target, no trailing or clocks.
    #[must_use]
    pub const fn simple(
        direction: PositionDirection,
        entry_price: Decimal,
        stop_loss: Option<Decimal>,
        target: Option<Decimal>,
    ) -> Self {
        Self {
            direction,
            entry_price,
            stop_loss,
            target,
            trailing: TrailingMode::Off,
            max_hold: None,
            square_off: None,
        }
    }

    /// Whether the stop-loss level is crossed at `price`.
    #[must_use]
    pub fn stop_hit(&self, price: Decimal) -> Option<Decimal> {
        let level = self.stop_loss?;
        let hit = match self.direction {
            PositionDirection::Long => price <= level,
            PositionDirection::Short => price >= level,
        };
        hit.then_some(level)
    }

    /// Whether the target level is crossed at `price`.
    #[must_use]
    pub fn target_hit(&self, price: Decimal) -> Option<Decimal> {
        let level = self.target?;
        let hit = match self.direction {
            PositionDirection::Long => price >= level,
            PositionDirection::Short => price <= level,
        };
        hit.then_some(level)
    }
}
