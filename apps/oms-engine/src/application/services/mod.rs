//! Application Services
//!
//! The long-running engines of the platform. Each owns one concern and runs
//! on its own clock: the command service is the sole gate for new exposure,
//! the watcher is the sole originator of exits and the reconciliation
//! authority, the risk manager supervises client PnL, and the strategy
//! engine drives the configured strategy.

mod commands;
mod guard;
mod pending;
mod risk_manager;
mod strangle;
mod strategy_engine;
mod tracker;
mod watcher;

pub use commands::{CommandError, CommandService, SubmitOutcome};
pub use guard::{ExecutionGuard, GuardDecision, GuardError, GuardLayer};
pub use pending::PendingCommandSet;
pub use risk_manager::{ForcedExit, RiskManagerService};
pub use strangle::{DeltaNeutralStrangle, StrangleConfig};
pub use strategy_engine::{Strategy, StrategyContext, StrategyEngineService, StrategyKind};
pub use tracker::IntentTracker;
pub use watcher::{ExitRequest, OrderWatcherService, WatcherConfig};
