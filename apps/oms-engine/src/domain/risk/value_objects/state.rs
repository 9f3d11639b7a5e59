//! Per-client intraday risk state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Mutable risk counters for one client, valid for one trading day.
///
/// The loss flag is sticky: once set it survives PnL recovering above the
/// limit, and only [`ClientRiskState::rollover`] clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRiskState {
    daily_pnl: Decimal,
    daily_loss_hit: bool,
    orders_today: u32,
    open_positions: u32,
}

impl ClientRiskState {
    /// Fresh state at the start of a trading day.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the daily PnL from the latest broker snapshot.
    #[must_use]
    pub const fn daily_pnl(&self) -> Decimal {
        self.daily_pnl
    }

    /// Whether the daily loss limit has been hit today.
    #[must_use]
    pub const fn daily_loss_hit(&self) -> bool {
        self.daily_loss_hit
    }

    /// Get the count of exposure-opening orders accepted today.
    #[must_use]
    pub const fn orders_today(&self) -> u32 {
        self.orders_today
    }

    /// Get the count of open position slots from the latest snapshot.
    #[must_use]
    pub const fn open_positions(&self) -> u32 {
        self.open_positions
    }

    /// Replace the broker-derived figures with a fresh snapshot.
    pub fn observe(&mut self, daily_pnl: Decimal, open_positions: u32) {
        self.daily_pnl = daily_pnl;
        self.open_positions = open_positions;
    }

    /// Count one accepted exposure-opening order.
    pub fn record_order(&mut self) {
        self.orders_today = self.orders_today.saturating_add(1);
    }

    /// Latch the daily loss flag.
    pub fn mark_loss_hit(&mut self) {
        self.daily_loss_hit = true;
    }

    /// Reset everything for a new trading day.
    pub fn rollover(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_state_is_zeroed() {
        let state = ClientRiskState::new();
        assert_eq!(state.daily_pnl(), Decimal::ZERO);
        assert!(!state.daily_loss_hit());
        assert_eq!(state.orders_today(), 0);
        assert_eq!(state.open_positions(), 0);
    }

    #[test]
    fn observe_replaces_snapshot_figures() {
        let mut state = ClientRiskState::new();
        state.observe(dec!(-3200), 4);
        assert_eq!(state.daily_pnl(), dec!(-3200));
        assert_eq!(state.open_positions(), 4);

        state.observe(dec!(150), 1);
        assert_eq!(state.daily_pnl(), dec!(150));
        assert_eq!(state.open_positions(), 1);
    }

    #[test]
    fn loss_flag_sticks_through_recovery() {
        let mut state = ClientRiskState::new();
        state.observe(dec!(-11000), 3);
        state.mark_loss_hit();

        // PnL recovering does not clear the flag.
        state.observe(dec!(-2000), 3);
        assert!(state.daily_loss_hit());
    }

    #[test]
    fn rollover_clears_everything() {
        let mut state = ClientRiskState::new();
        state.observe(dec!(-11000), 3);
        state.mark_loss_hit();
        state.record_order();
        state.record_order();

        state.rollover();
        assert_eq!(state, ClientRiskState::new());
    }

    #[test]
    fn record_order_counts_up() {
        let mut state = ClientRiskState::new();
        for _ in 0..5 {
            state.record_order();
        }
        assert_eq!(state.orders_today(), 5);
    }
}
