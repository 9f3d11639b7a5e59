//! Strangle Leg Value Object

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::exits::value_objects::PositionDirection;
use crate::domain::shared::Symbol;

/// Which side of the strangle a leg lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LegSlot {
    /// Call option leg.
    Call,
    /// Put option leg.
    Put,
}

impl fmt::Display for LegSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "CE"),
            Self::Put => write!(f, "PE"),
        }
    }
}

/// One contract inside the strangle, owned exclusively by the strategy
/// state and replaced in place on adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    symbol: Symbol,
    direction: PositionDirection,
    entry_price: Decimal,
    current_price: Decimal,
    delta: Decimal,
    quantity: u32,
}

impl Leg {
    /// Create a leg at its fill price. Current price starts at entry.
    #[must_use]
    pub const fn new(
        symbol: Symbol,
        direction: PositionDirection,
        entry_price: Decimal,
        delta: Decimal,
        quantity: u32,
    ) -> Self {
        Self {
            symbol,
            direction,
            entry_price,
            current_price: entry_price,
            delta,
            quantity,
        }
    }

    /// Get the contract symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Get the position direction.
    #[must_use]
    pub const fn direction(&self) -> PositionDirection {
        self.direction
    }

    /// Get the entry price.
    #[must_use]
    pub const fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    /// Get the latest traded price.
    #[must_use]
    pub const fn current_price(&self) -> Decimal {
        self.current_price
    }

    /// Get the latest option delta.
    #[must_use]
    pub const fn delta(&self) -> Decimal {
        self.delta
    }

    /// Get the contract quantity.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Refresh price and delta from a market tick.
    pub const fn update_quote(&mut self, price: Decimal, delta: Decimal) {
        self.current_price = price;
        self.delta = delta;
    }

    /// Signed delta exposure of this leg: sign x delta x quantity.
    #[must_use]
    pub fn position_delta(&self) -> Decimal {
        Decimal::from(self.direction.sign()) * self.delta * Decimal::from(self.quantity)
    }

    /// Mark-to-market PnL of this leg against its entry price.
    #[must_use]
    pub fn unrealized_pnl(&self) -> Decimal {
        Decimal::from(self.direction.sign())
            * (self.current_price - self.entry_price)
            * Decimal::from(self.quantity)
    }
}
