//! Execution Guard
//!
//! Three stacked duplicate checks that every exposure-opening intent must
//! clear before the broker sees it. Memory catches near-simultaneous
//! submissions, the repository catches everything since process start and
//! across restarts, and the broker book catches orders the engine never
//! knew about.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::application::ports::{BrokerError, BrokerPort};
use crate::application::services::pending::PendingCommandSet;
use crate::domain::intent::{IntentError, OrderIntent, OrderRepository, Side};

/// Which layer blocked an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardLayer {
    /// Pending command set.
    Memory,
    /// Order repository.
    Repository,
    /// Broker order and position books.
    Broker,
}

impl fmt::Display for GuardLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Repository => write!(f, "repository"),
            Self::Broker => write!(f, "broker"),
        }
    }
}

/// Outcome of a guard pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// No layer objected.
    Clear,
    /// A layer found the order already exists or is in flight.
    Blocked {
        /// The layer that objected.
        layer: GuardLayer,
        /// What it found.
        reason: String,
    },
}

impl GuardDecision {
    /// Whether the intent may proceed.
    #[must_use]
    pub const fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }
}

/// Guard verification error: a layer could not be consulted.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Repository query failed.
    #[error(transparent)]
    Intent(#[from] IntentError),

    /// Broker book fetch failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Layered duplicate-execution guard.
pub struct ExecutionGuard<O, B> {
    repository: Arc<O>,
    broker: Arc<B>,
    pending: Arc<PendingCommandSet>,
}

impl<O, B> ExecutionGuard<O, B>
where
    O: OrderRepository,
    B: BrokerPort,
{
    /// Create a guard over the three layers.
    #[must_use]
    pub fn new(repository: Arc<O>, broker: Arc<B>, pending: Arc<PendingCommandSet>) -> Self {
        Self {
            repository,
            broker,
            pending,
        }
    }

    /// Check an intent against all layers, cheapest first.
    ///
    /// Exit intents always pass: a duplicate exit against a flat position
    /// is a no-op at the broker, while a suppressed exit leaves exposure
    /// unprotected.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError`] when a layer cannot be consulted; the caller
    /// must treat that as a refusal to submit, not as clearance.
    pub async fn check(&self, intent: &OrderIntent) -> Result<GuardDecision, GuardError> {
        if intent.execution_type().is_exit() {
            return Ok(GuardDecision::Clear);
        }

        let key = intent.logical_key();

        if self.pending.contains(&key) {
            return Ok(GuardDecision::Blocked {
                layer: GuardLayer::Memory,
                reason: format!("command in flight for {key}"),
            });
        }

        let live = self.repository.find_live_by_logical_key(&key).await?;
        if let Some(existing) = live.first() {
            return Ok(GuardDecision::Blocked {
                layer: GuardLayer::Repository,
                reason: format!(
                    "record {} already {} for {key}",
                    existing.intent().command_id(),
                    existing.status()
                ),
            });
        }

        let positions = self.broker.positions(intent.client_id()).await?;
        for position in &positions {
            if position.symbol != *intent.symbol() || position.product != intent.product() {
                continue;
            }
            let same_direction = match intent.side() {
                Side::Buy => position.net_qty > 0,
                Side::Sell => position.net_qty < 0,
            };
            if same_direction {
                return Ok(GuardDecision::Blocked {
                    layer: GuardLayer::Broker,
                    reason: format!(
                        "live position net_qty {} on {}/{}",
                        position.net_qty, position.symbol, position.product
                    ),
                });
            }
        }

        let orders = self.broker.order_book(intent.client_id()).await?;
        for order in &orders {
            if order.symbol == *intent.symbol()
                && order.product == intent.product()
                && order.status.is_open()
            {
                return Ok(GuardDecision::Blocked {
                    layer: GuardLayer::Broker,
                    reason: format!(
                        "open broker order {} on {}/{}",
                        order.broker_order_id, order.symbol, order.product
                    ),
                });
            }
        }

        Ok(GuardDecision::Clear)
    }
}
