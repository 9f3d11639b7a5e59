//! Pending Command Set
//!
//! In-memory claim table for intents between acceptance and a terminal
//! status. This is the first guard layer: claims are taken before any I/O
//! so two near-simultaneous submissions of the same logical order cannot
//! both reach the broker.

use parking_lot::RwLock;
use std::collections::HashSet;

use crate::domain::intent::LogicalKey;

/// Set of logical keys with an order currently in flight.
#[derive(Debug, Default)]
pub struct PendingCommandSet {
    keys: RwLock<HashSet<LogicalKey>>,
}

impl PendingCommandSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a key. Returns false if it is already held.
    pub fn try_claim(&self, key: LogicalKey) -> bool {
        self.keys.write().insert(key)
    }

    /// Release a key once its order reaches a terminal status.
    ///
    /// Releasing an unclaimed key is a no-op; reconciliation may release
    /// after a restart that lost the in-memory claims.
    pub fn release(&self, key: &LogicalKey) {
        self.keys.write().remove(key);
    }

    /// Whether a key is currently claimed.
    #[must_use]
    pub fn contains(&self, key: &LogicalKey) -> bool {
        self.keys.read().contains(key)
    }

    /// Count of claimed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether no keys are claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}
