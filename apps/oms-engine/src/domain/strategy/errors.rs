//! Strategy Errors

use thiserror::Error;

use super::value_objects::{LegSlot, StranglePhase};

/// Errors raised by the strangle state machine and its drivers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyError {
    /// A transition was requested from the wrong phase.
    #[error("Invalid phase for {action}: currently {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: StranglePhase,
    },

    /// A leg that should be present is absent.
    #[error("Missing {slot} leg")]
    MissingLeg { slot: LegSlot },

    /// No adjustment is in flight.
    #[error("No adjustment in flight")]
    NoAdjustmentInFlight,

    /// Instrument metadata could not be resolved; the strategy must not
    /// start half-configured.
    #[error("Config resolution failed: {reason}")]
    ConfigResolutionFailed { reason: String },

    /// Market data needed for a decision is unavailable.
    #[error("Market data unavailable: {reason}")]
    MarketUnavailable { reason: String },

    /// An order submission was refused or failed.
    #[error("Execution rejected: {reason}")]
    ExecutionRejected { reason: String },
}
