//! Strangle State Machine

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::leg::{Leg, LegSlot};
use crate::domain::shared::Timestamp;
use crate::domain::strategy::errors::StrategyError;

/// Lifecycle phase of the strangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StranglePhase {
    /// No legs; waiting for the entry window.
    Idle,
    /// Entry intents submitted, awaiting both fills.
    Entering,
    /// Both legs filled; evaluating drift on each tick.
    Active,
    /// One leg being rolled to a fresh strike.
    Adjusting,
    /// Exit intents submitted for all legs, awaiting flat.
    Exiting,
}

impl fmt::Display for StranglePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Entering => "ENTERING",
            Self::Active => "ACTIVE",
            Self::Adjusting => "ADJUSTING",
            Self::Exiting => "EXITING",
        };
        write!(f, "{s}")
    }
}

/// Bookkeeping for an in-flight leg roll.
///
/// Holds the leg being replaced so a failed roll can restore it untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAdjustment {
    /// Slot being rolled.
    pub slot: LegSlot,
    /// Delta the replacement leg is selected at.
    pub target_delta: Decimal,
    /// The leg as it was before the roll started.
    pub prior_leg: Leg,
}

/// Full state of one delta-neutral strangle.
///
/// Phases move `Idle -> Entering -> Active -> Adjusting -> Active` and
/// `Active -> Exiting -> Idle`. Every transition is guarded; an illegal
/// request returns an error rather than corrupting the legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrangleState {
    phase: StranglePhase,
    ce_leg: Option<Leg>,
    pe_leg: Option<Leg>,
    realized_pnl: Decimal,
    pending_adjustment: Option<PendingAdjustment>,
    next_profit_target: Option<Decimal>,
    last_adjustment_at: Option<Timestamp>,
}

impl StrangleState {
    /// Fresh idle state with no legs.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: StranglePhase::Idle,
            ce_leg: None,
            pe_leg: None,
            realized_pnl: Decimal::ZERO,
            pending_adjustment: None,
            next_profit_target: None,
            last_adjustment_at: None,
        }
    }

    /// Get the current phase.
    #[must_use]
    pub const fn phase(&self) -> StranglePhase {
        self.phase
    }

    /// Get the call leg.
    #[must_use]
    pub const fn ce_leg(&self) -> Option<&Leg> {
        self.ce_leg.as_ref()
    }

    /// Get the put leg.
    #[must_use]
    pub const fn pe_leg(&self) -> Option<&Leg> {
        self.pe_leg.as_ref()
    }

    /// Get the leg in `slot`.
    #[must_use]
    pub const fn leg(&self, slot: LegSlot) -> Option<&Leg> {
        match slot {
            LegSlot::Call => self.ce_leg.as_ref(),
            LegSlot::Put => self.pe_leg.as_ref(),
        }
    }

    /// PnL realized by completed rolls and exits.
    #[must_use]
    pub const fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Get the in-flight adjustment, if any.
    #[must_use]
    pub const fn pending_adjustment(&self) -> Option<&PendingAdjustment> {
        self.pending_adjustment.as_ref()
    }

    /// Get the next profit-step target.
    #[must_use]
    pub const fn next_profit_target(&self) -> Option<Decimal> {
        self.next_profit_target
    }

    /// Get the time of the last completed adjustment.
    #[must_use]
    pub const fn last_adjustment_at(&self) -> Option<Timestamp> {
        self.last_adjustment_at
    }

    /// Whether the strategy currently holds any leg.
    #[must_use]
    pub const fn has_legs(&self) -> bool {
        self.ce_leg.is_some() || self.pe_leg.is_some()
    }

    /// Arm the profit-step target.
    pub fn set_profit_target(&mut self, target: Option<Decimal>) {
        self.next_profit_target = target;
    }

    /// Start entering: `Idle -> Entering`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidPhase`] unless idle.
    pub fn begin_entry(&mut self) -> Result<(), StrategyError> {
        self.require_phase(StranglePhase::Idle, "begin_entry")?;
        self.phase = StranglePhase::Entering;
        Ok(())
    }

    /// Both legs filled: `Entering -> Active`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidPhase`] unless entering.
    pub fn confirm_entry(&mut self, ce: Leg, pe: Leg) -> Result<(), StrategyError> {
        self.require_phase(StranglePhase::Entering, "confirm_entry")?;
        self.ce_leg = Some(ce);
        self.pe_leg = Some(pe);
        self.phase = StranglePhase::Active;
        Ok(())
    }

    /// Entry failed and any filled leg was unwound: `Entering -> Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidPhase`] unless entering.
    pub fn abort_entry(&mut self) -> Result<(), StrategyError> {
        self.require_phase(StranglePhase::Entering, "abort_entry")?;
        self.ce_leg = None;
        self.pe_leg = None;
        self.phase = StranglePhase::Idle;
        Ok(())
    }

    /// Start rolling `slot`: `Active -> Adjusting`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidPhase`] unless active, or
    /// [`StrategyError::MissingLeg`] if the slot is empty.
    pub fn begin_adjustment(
        &mut self,
        slot: LegSlot,
        target_delta: Decimal,
    ) -> Result<(), StrategyError> {
        self.require_phase(StranglePhase::Active, "begin_adjustment")?;
        let prior_leg = self
            .leg(slot)
            .cloned()
            .ok_or(StrategyError::MissingLeg { slot })?;
        self.pending_adjustment = Some(PendingAdjustment {
            slot,
            target_delta,
            prior_leg,
        });
        self.phase = StranglePhase::Adjusting;
        Ok(())
    }

    /// Roll succeeded: `Adjusting -> Active` with the replacement leg in
    /// place and the closed leg's PnL realized.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidPhase`] unless adjusting, or
    /// [`StrategyError::NoAdjustmentInFlight`] if nothing was staged.
    pub fn complete_adjustment(
        &mut self,
        replacement: Leg,
        closed_leg_pnl: Decimal,
        now: Timestamp,
    ) -> Result<(), StrategyError> {
        self.require_phase(StranglePhase::Adjusting, "complete_adjustment")?;
        let pending = self
            .pending_adjustment
            .take()
            .ok_or(StrategyError::NoAdjustmentInFlight)?;
        match pending.slot {
            LegSlot::Call => self.ce_leg = Some(replacement),
            LegSlot::Put => self.pe_leg = Some(replacement),
        }
        self.realized_pnl += closed_leg_pnl;
        self.last_adjustment_at = Some(now);
        self.phase = StranglePhase::Active;
        Ok(())
    }

    /// Roll failed: `Adjusting -> Active` with the prior leg restored.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidPhase`] unless adjusting, or
    /// [`StrategyError::NoAdjustmentInFlight`] if nothing was staged.
    pub fn revert_adjustment(&mut self) -> Result<(), StrategyError> {
        self.require_phase(StranglePhase::Adjusting, "revert_adjustment")?;
        let pending = self
            .pending_adjustment
            .take()
            .ok_or(StrategyError::NoAdjustmentInFlight)?;
        match pending.slot {
            LegSlot::Call => self.ce_leg = Some(pending.prior_leg),
            LegSlot::Put => self.pe_leg = Some(pending.prior_leg),
        }
        self.phase = StranglePhase::Active;
        Ok(())
    }

    /// Start closing everything: `Active -> Exiting`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidPhase`] unless active.
    pub fn begin_exit(&mut self) -> Result<(), StrategyError> {
        self.require_phase(StranglePhase::Active, "begin_exit")?;
        self.phase = StranglePhase::Exiting;
        Ok(())
    }

    /// Broker reports flat: `Exiting -> Idle`, legs cleared.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidPhase`] unless exiting.
    pub fn confirm_flat(&mut self, exit_pnl: Decimal) -> Result<(), StrategyError> {
        self.require_phase(StranglePhase::Exiting, "confirm_flat")?;
        self.ce_leg = None;
        self.pe_leg = None;
        self.realized_pnl += exit_pnl;
        self.pending_adjustment = None;
        self.next_profit_target = None;
        self.phase = StranglePhase::Idle;
        Ok(())
    }

    /// Refresh one leg's quote. Absent legs are ignored.
    pub fn update_quote(&mut self, slot: LegSlot, price: Decimal, delta: Decimal) {
        let leg = match slot {
            LegSlot::Call => self.ce_leg.as_mut(),
            LegSlot::Put => self.pe_leg.as_mut(),
        };
        if let Some(leg) = leg {
            leg.update_quote(price, delta);
        }
    }

    /// Net delta across present legs.
    #[must_use]
    pub fn net_delta(&self) -> Decimal {
        self.ce_leg
            .iter()
            .chain(self.pe_leg.iter())
            .map(Leg::position_delta)
            .sum()
    }

    /// Mark-to-market PnL across present legs plus realized PnL.
    #[must_use]
    pub fn total_pnl(&self) -> Decimal {
        let unrealized: Decimal = self
            .ce_leg
            .iter()
            .chain(self.pe_leg.iter())
            .map(Leg::unrealized_pnl)
            .sum();
        self.realized_pnl + unrealized
    }

    /// Which leg to roll when net delta drifts past `trigger`.
    ///
    /// Only meaningful while active with both legs on. The leg with the
    /// larger absolute delta is the drifter; equal magnitudes mean the
    /// drift came from quantity imbalance and no single leg is picked.
    #[must_use]
    pub fn drifting_leg(&self, trigger: Decimal) -> Option<LegSlot> {
        if self.phase != StranglePhase::Active {
            return None;
        }
        let ce = self.ce_leg.as_ref()?;
        let pe = self.pe_leg.as_ref()?;
        if self.net_delta().abs() <= trigger {
            return None;
        }
        let ce_mag = ce.delta().abs();
        let pe_mag = pe.delta().abs();
        if ce_mag > pe_mag {
            Some(LegSlot::Call)
        } else if pe_mag > ce_mag {
            Some(LegSlot::Put)
        } else {
            None
        }
    }

    /// Whether enough time has passed since the last completed adjustment.
    #[must_use]
    pub fn cooldown_elapsed(&self, now: Timestamp, cooldown: Duration) -> bool {
        match self.last_adjustment_at {
            None => true,
            Some(last) => now.duration_since(last) >= cooldown,
        }
    }

    /// Whether total PnL has reached the armed profit-step target.
    #[must_use]
    pub fn profit_target_hit(&self) -> bool {
        match self.next_profit_target {
            None => false,
            Some(target) => self.total_pnl() >= target,
        }
    }

    fn require_phase(
        &self,
        expected: StranglePhase,
        action: &'static str,
    ) -> Result<(), StrategyError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(StrategyError::InvalidPhase {
                action,
                phase: self.phase,
            })
        }
    }
}

impl Default for StrangleState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exits::value_objects::PositionDirection;
    use crate::domain::shared::Symbol;
    use rust_decimal_macros::dec;

    fn short_ce() -> Leg {
        Leg::new(
            Symbol::new("NIFTY25MAR23600CE"),
            PositionDirection::Short,
            dec!(145.50),
            dec!(0.30),
            75,
        )
    }

    fn short_pe() -> Leg {
        Leg::new(
            Symbol::new("NIFTY25MAR23200PE"),
            PositionDirection::Short,
            dec!(138.00),
            dec!(-0.30),
            75,
        )
    }

    fn active_state() -> StrangleState {
        let mut state = StrangleState::new();
        state.begin_entry().unwrap();
        state.confirm_entry(short_ce(), short_pe()).unwrap();
        state
    }

    #[test]
    fn fresh_state_is_idle_with_no_legs() {
        let state = StrangleState::new();
        assert_eq!(state.phase(), StranglePhase::Idle);
        assert!(!state.has_legs());
        assert_eq!(state.net_delta(), Decimal::ZERO);
    }

    #[test]
    fn entry_flow_reaches_active() {
        let state = active_state();
        assert_eq!(state.phase(), StranglePhase::Active);
        assert!(state.ce_leg().is_some());
        assert!(state.pe_leg().is_some());
    }

    #[test]
    fn balanced_strangle_has_zero_net_delta() {
        let state = active_state();
        assert_eq!(state.net_delta(), Decimal::ZERO);
    }

    #[test]
    fn abort_entry_returns_to_idle() {
        let mut state = StrangleState::new();
        state.begin_entry().unwrap();
        state.abort_entry().unwrap();
        assert_eq!(state.phase(), StranglePhase::Idle);
        assert!(!state.has_legs());
    }

    #[test]
    fn cannot_enter_twice() {
        let mut state = active_state();
        assert_eq!(
            state.begin_entry(),
            Err(StrategyError::InvalidPhase {
                action: "begin_entry",
                phase: StranglePhase::Active,
            })
        );
    }

    #[test]
    fn drift_names_the_heavier_leg() {
        let mut state = active_state();

        // Spot rallies: call delta swells, put delta shrinks.
        state.update_quote(LegSlot::Call, dec!(190), dec!(0.48));
        state.update_quote(LegSlot::Put, dec!(95), dec!(-0.16));

        // Net = -0.48*75 + 0.16*75 = -24.
        assert_eq!(state.net_delta(), dec!(-24.00));
        assert_eq!(state.drifting_leg(dec!(20)), Some(LegSlot::Call));
        assert_eq!(state.drifting_leg(dec!(30)), None);
    }

    #[test]
    fn drift_is_only_reported_while_active() {
        let mut state = active_state();
        state.update_quote(LegSlot::Call, dec!(190), dec!(0.48));
        state.update_quote(LegSlot::Put, dec!(95), dec!(-0.16));
        state.begin_exit().unwrap();
        assert_eq!(state.drifting_leg(dec!(10)), None);
    }

    #[test]
    fn adjustment_replaces_leg_and_realizes_pnl() {
        let mut state = active_state();
        state.update_quote(LegSlot::Call, dec!(190), dec!(0.48));

        state.begin_adjustment(LegSlot::Call, dec!(0.30)).unwrap();
        assert_eq!(state.phase(), StranglePhase::Adjusting);
        assert_eq!(
            state.pending_adjustment().map(|p| p.slot),
            Some(LegSlot::Call)
        );

        let replacement = Leg::new(
            Symbol::new("NIFTY25MAR23900CE"),
            PositionDirection::Short,
            dec!(140.00),
            dec!(0.30),
            75,
        );
        let now = Timestamp::parse("2026-02-12T06:10:00Z").unwrap();
        state
            .complete_adjustment(replacement, dec!(-3337.50), now)
            .unwrap();

        assert_eq!(state.phase(), StranglePhase::Active);
        assert_eq!(state.realized_pnl(), dec!(-3337.50));
        assert_eq!(state.last_adjustment_at(), Some(now));
        assert_eq!(
            state.ce_leg().map(|l| l.symbol().as_str().to_string()),
            Some("NIFTY25MAR23900CE".to_string())
        );
    }

    #[test]
    fn failed_adjustment_restores_prior_leg() {
        let mut state = active_state();
        state.begin_adjustment(LegSlot::Put, dec!(0.30)).unwrap();
        state.revert_adjustment().unwrap();

        assert_eq!(state.phase(), StranglePhase::Active);
        assert_eq!(
            state.pe_leg().map(|l| l.symbol().as_str().to_string()),
            Some("NIFTY25MAR23200PE".to_string())
        );
        assert!(state.pending_adjustment().is_none());
    }

    #[test]
    fn adjusting_missing_leg_is_rejected() {
        let mut state = StrangleState::new();
        state.begin_entry().unwrap();
        state.confirm_entry(short_ce(), short_pe()).unwrap();
        state.begin_exit().unwrap();
        state.confirm_flat(dec!(0)).unwrap();

        assert_eq!(
            state.begin_adjustment(LegSlot::Call, dec!(0.30)),
            Err(StrategyError::InvalidPhase {
                action: "begin_adjustment",
                phase: StranglePhase::Idle,
            })
        );
    }

    #[test]
    fn exit_flow_clears_legs_and_accumulates_pnl() {
        let mut state = active_state();
        state.begin_exit().unwrap();
        state.confirm_flat(dec!(4100)).unwrap();

        assert_eq!(state.phase(), StranglePhase::Idle);
        assert!(!state.has_legs());
        assert_eq!(state.realized_pnl(), dec!(4100));
        assert!(state.next_profit_target().is_none());
    }

    #[test]
    fn cooldown_gates_repeat_adjustments() {
        let mut state = active_state();
        let t0 = Timestamp::parse("2026-02-12T06:00:00Z").unwrap();
        assert!(state.cooldown_elapsed(t0, Duration::minutes(10)));

        state.begin_adjustment(LegSlot::Call, dec!(0.30)).unwrap();
        state
            .complete_adjustment(short_ce(), dec!(0), t0)
            .unwrap();

        let t1 = Timestamp::parse("2026-02-12T06:05:00Z").unwrap();
        assert!(!state.cooldown_elapsed(t1, Duration::minutes(10)));

        let t2 = Timestamp::parse("2026-02-12T06:10:00Z").unwrap();
        assert!(state.cooldown_elapsed(t2, Duration::minutes(10)));
    }

    #[test]
    fn profit_target_checks_total_pnl() {
        let mut state = active_state();
        assert!(!state.profit_target_hit());

        state.set_profit_target(Some(dec!(5000)));
        assert!(!state.profit_target_hit());

        // Premium decays on both legs: 45.50*75 + 43*75 = 6637.50.
        state.update_quote(LegSlot::Call, dec!(100), dec!(0.20));
        state.update_quote(LegSlot::Put, dec!(95), dec!(-0.20));
        assert!(state.profit_target_hit());
    }
}
