//! Trailing stop computation, selected by configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::direction::PositionDirection;

/// How the trailing level follows price.
///
/// Each variant is a self-contained computation; the evaluator calls
/// [`TrailingMode::advance`] without knowing which one is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailingMode {
    /// No trailing stop.
    Off,
    /// Trail at a percentage of the last traded price.
    Percent {
        /// Distance in percent (5 means 5%).
        trail_pct: Decimal,
    },
    /// Trail at a fixed points distance from the last traded price.
    Points {
        /// Distance in price points.
        trail_points: Decimal,
    },
}

impl TrailingMode {
    /// Whether trailing is disabled.
    #[must_use]
    pub const fn is_off(&self) -> bool {
        matches!(self, Self::Off)
    }

    /// Level implied by the latest price alone, before the monotonic clamp.
    #[must_use]
    fn candidate(&self, direction: PositionDirection, last_price: Decimal) -> Option<Decimal> {
        let distance = match self {
            Self::Off => return None,
            Self::Percent { trail_pct } => last_price * *trail_pct / Decimal::ONE_HUNDRED,
            Self::Points { trail_points } => *trail_points,
        };
        Some(match direction {
            PositionDirection::Long => last_price - distance,
            PositionDirection::Short => last_price + distance,
        })
    }

    /// Advance the trailing level with the latest price.
    ///
    /// The level only ever moves in the favorable direction: up for longs,
    /// down for shorts. An adverse tick leaves it where it was.
    #[must_use]
    pub fn advance(
        &self,
        direction: PositionDirection,
        current: Option<Decimal>,
        last_price: Decimal,
    ) -> Option<Decimal> {
        let candidate = self.candidate(direction, last_price)?;
        Some(match (direction, current) {
            (_, None) => candidate,
            (PositionDirection::Long, Some(level)) => level.max(candidate),
            (PositionDirection::Short, Some(level)) => level.min(candidate),
        })
    }

    /// Whether the latest price has crossed the trailing level.
    #[must_use]
    pub fn breached(
        direction: PositionDirection,
        level: Decimal,
        last_price: Decimal,
    ) -> bool {
        match direction {
            PositionDirection::Long => last_price <= level,
            PositionDirection::Short => last_price >= level,
        }
    }
}
