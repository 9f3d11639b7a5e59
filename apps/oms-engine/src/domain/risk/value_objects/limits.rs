//! Risk limit configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Hard limits enforced per client per trading day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum tolerated daily loss, as a positive magnitude.
    pub daily_loss_limit: Decimal,
    /// Maximum simultaneously open position slots.
    pub max_open_positions: u32,
    /// Maximum exposure-opening orders per day.
    pub max_orders_per_day: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            daily_loss_limit: dec!(10000),
            max_open_positions: 6,
            max_orders_per_day: 40,
        }
    }
}

impl RiskLimits {
    /// Whether `daily_pnl` has fallen through the loss limit.
    #[must_use]
    pub fn loss_breached(&self, daily_pnl: Decimal) -> bool {
        daily_pnl <= -self.daily_loss_limit
    }
}
