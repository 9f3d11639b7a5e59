//! Tracked position value object.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::levels::ExitLevels;
use super::trigger::ExitTrigger;
use crate::domain::shared::{ClientId, CommandId, Exchange, Product, Symbol, Timestamp};

/// Identity of a broker position slot: one instrument in one product
/// bucket for one client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackKey {
    /// Owning trading account.
    pub client_id: ClientId,
    /// Exchange segment.
    pub exchange: Exchange,
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Product bucket.
    pub product: Product,
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.client_id, self.exchange, self.symbol, self.product
        )
    }
}

/// Where a watched position sits in its life.
///
/// `Closed` is only ever set from broker-reported net quantity, never from
/// local assumptions about an exit order's fate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionPhase {
    /// Open at the broker, exits being evaluated.
    Live,
    /// An exit order has been sent; awaiting the broker to report flat.
    ExitTriggered,
    /// Broker reports net quantity zero.
    Closed,
}

/// One position under watch, with its exit rules and trailing state.
#[derive(Debug, Clone)]
pub struct TrackedPosition {
    key: TrackKey,
    origin: CommandId,
    quantity: u32,
    levels: ExitLevels,
    trailing_level: Option<Decimal>,
    phase: PositionPhase,
    last_trigger: Option<ExitTrigger>,
    entered_at: Timestamp,
}

impl TrackedPosition {
    /// Start watching a position.
    #[must_use]
    pub const fn new(
        key: TrackKey,
        origin: CommandId,
        quantity: u32,
        levels: ExitLevels,
        entered_at: Timestamp,
    ) -> Self {
        Self {
            key,
            origin,
            quantity,
            levels,
            trailing_level: None,
            phase: PositionPhase::Live,
            last_trigger: None,
            entered_at,
        }
    }

    /// Get the position key.
    #[must_use]
    pub const fn key(&self) -> &TrackKey {
        &self.key
    }

    /// Get the command ID of the entry that opened this position.
    #[must_use]
    pub const fn origin(&self) -> &CommandId {
        &self.origin
    }

    /// Get the absolute quantity under watch.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Get the exit levels.
    #[must_use]
    pub const fn levels(&self) -> &ExitLevels {
        &self.levels
    }

    /// Get the current trailing level.
    #[must_use]
    pub const fn trailing_level(&self) -> Option<Decimal> {
        self.trailing_level
    }

    /// Get the current phase.
    #[must_use]
    pub const fn phase(&self) -> PositionPhase {
        self.phase
    }

    /// Get the trigger that fired, if any.
    #[must_use]
    pub const fn last_trigger(&self) -> Option<&ExitTrigger> {
        self.last_trigger.as_ref()
    }

    /// Get the entry timestamp.
    #[must_use]
    pub const fn entered_at(&self) -> Timestamp {
        self.entered_at
    }

    /// Whether exits are still being evaluated.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.phase == PositionPhase::Live
    }

    /// Replace the trailing level. The evaluator owns the monotonic clamp.
    pub fn set_trailing_level(&mut self, level: Option<Decimal>) {
        self.trailing_level = level;
    }

    /// Record that an exit was dispatched for `trigger`.
    ///
    /// Returns false if the position is not live: a position exits at most
    /// once per breach, and a closed one not at all.
    pub fn mark_exit_triggered(&mut self, trigger: ExitTrigger) -> bool {
        if self.phase != PositionPhase::Live {
            return false;
        }
        self.phase = PositionPhase::ExitTriggered;
        self.last_trigger = Some(trigger);
        true
    }

    /// Feed the broker-reported net quantity for this slot.
    ///
    /// Zero closes the position regardless of phase; this is the only way
    /// a tracked position reaches `Closed`.
    pub fn observe_net_qty(&mut self, net_qty: i64) {
        if net_qty == 0 {
            self.phase = PositionPhase::Closed;
        }
    }
}
