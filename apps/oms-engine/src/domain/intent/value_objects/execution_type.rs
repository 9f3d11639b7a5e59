//! Execution type of an order intent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What an intent does to exposure.
///
/// ENTRY opens a position, ADJUST rebalances one, EXIT flattens one.
/// Only the order watcher may originate EXIT orders toward the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionType {
    /// Opens new exposure.
    Entry,
    /// Rebalances existing exposure (e.g. rolling a leg).
    Adjust,
    /// Flattens existing exposure.
    Exit,
}

impl ExecutionType {
    /// Returns true for EXIT intents.
    #[must_use]
    pub const fn is_exit(&self) -> bool {
        matches!(self, Self::Exit)
    }

    /// Returns true for intents that add or reshape exposure.
    ///
    /// These are the only intents the command gate accepts, and the only
    /// ones the duplicate guard applies to.
    #[must_use]
    pub const fn opens_exposure(&self) -> bool {
        matches!(self, Self::Entry | Self::Adjust)
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry => write!(f, "ENTRY"),
            Self::Adjust => write!(f, "ADJUST"),
            Self::Exit => write!(f, "EXIT"),
        }
    }
}
