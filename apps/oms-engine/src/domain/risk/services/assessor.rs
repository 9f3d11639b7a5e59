//! Risk Assessment Domain Service

use crate::domain::risk::value_objects::{ClientRiskState, RiskBreach, RiskLimits, RiskVerdict};

/// Checks one client's state against the configured limits.
///
/// Pure: reads counters the caller derived from broker data, never fetches
/// anything itself. A sticky loss flag keeps the daily loss breach in the
/// verdict even after PnL recovers.
#[derive(Debug, Clone)]
pub struct RiskAssessor {
    limits: RiskLimits,
}

impl RiskAssessor {
    /// Create an assessor with the given limits.
    #[must_use]
    pub const fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    /// Get the configured limits.
    #[must_use]
    pub const fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Assess whether `state` permits opening new exposure.
    #[must_use]
    pub fn assess(&self, state: &ClientRiskState) -> RiskVerdict {
        let mut breaches = Vec::new();

        if state.daily_loss_hit() || self.limits.loss_breached(state.daily_pnl()) {
            breaches.push(RiskBreach::DailyLossBreached {
                daily_pnl: state.daily_pnl(),
                limit: self.limits.daily_loss_limit,
            });
        }

        if state.open_positions() >= self.limits.max_open_positions {
            breaches.push(RiskBreach::PositionCapExceeded {
                open_positions: state.open_positions(),
                limit: self.limits.max_open_positions,
            });
        }

        if state.orders_today() >= self.limits.max_orders_per_day {
            breaches.push(RiskBreach::OrderBudgetExhausted {
                orders_today: state.orders_today(),
                limit: self.limits.max_orders_per_day,
            });
        }

        RiskVerdict::from_breaches(breaches)
    }
}
