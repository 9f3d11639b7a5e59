//! Command Service
//!
//! The only path through which ENTRY and ADJUST intents reach the broker.
//! Claims the logical key, persists before sending, and records the broker's
//! answer exactly once. A refused or failed submission is a recorded outcome,
//! never a retry.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::ports::{
    BrokerError, BrokerPort, PlaceOrderParams, TraceEvent, TraceSinkPort, TraceStage,
};
use crate::application::services::guard::{ExecutionGuard, GuardDecision, GuardError, GuardLayer};
use crate::application::services::pending::PendingCommandSet;
use crate::application::services::risk_manager::RiskManagerService;
use crate::application::services::tracker::IntentTracker;
use crate::domain::intent::{
    ExecutionType, IntentError, OrderIntent, OrderRecord, OrderRepository, StatusUpdate,
};
use crate::domain::risk::RiskBreach;
use crate::domain::shared::CommandId;

/// Definitive result of a submission attempt.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Sent to the broker; record is SENT_TO_BROKER.
    Accepted(OrderRecord),
    /// A guard layer found the order already exists. Steady state, not an
    /// error: callers fire intents without coordinating with each other.
    Duplicate {
        /// Layer that objected.
        layer: GuardLayer,
        /// What it found.
        reason: String,
    },
    /// The risk manager vetoed new exposure for this client.
    RiskVetoed {
        /// Breaches behind the veto.
        breaches: Vec<RiskBreach>,
    },
    /// The broker refused or the send failed; record is FAILED.
    Failed(OrderRecord),
}

impl SubmitOutcome {
    /// Whether the intent reached the broker.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Command service error.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Exits are the watcher's to place, never this service's.
    #[error("EXIT intents are not accepted by the command service")]
    ExitNotAccepted,

    /// Repository failure.
    #[error(transparent)]
    Intent(#[from] IntentError),

    /// A guard layer could not be consulted.
    #[error(transparent)]
    Guard(#[from] GuardError),
}

/// Gate for exposure-opening intents.
pub struct CommandService<O, B, T: TraceSinkPort> {
    repository: Arc<O>,
    broker: Arc<B>,
    guard: ExecutionGuard<O, B>,
    pending: Arc<PendingCommandSet>,
    risk: Arc<RiskManagerService<B>>,
    tracker: IntentTracker<T>,
}

impl<O, B, T> CommandService<O, B, T>
where
    O: OrderRepository,
    B: BrokerPort,
    T: TraceSinkPort,
{
    /// Wire the service over its collaborators.
    #[must_use]
    pub fn new(
        repository: Arc<O>,
        broker: Arc<B>,
        pending: Arc<PendingCommandSet>,
        risk: Arc<RiskManagerService<B>>,
        tracker: IntentTracker<T>,
    ) -> Self {
        let guard = ExecutionGuard::new(
            Arc::clone(&repository),
            Arc::clone(&broker),
            Arc::clone(&pending),
        );
        Self {
            repository,
            broker,
            guard,
            pending,
            risk,
            tracker,
        }
    }

    /// Submit an ENTRY or ADJUST intent.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::ExitNotAccepted`] for exit intents, or an
    /// error when the guard or repository cannot be consulted. Broker
    /// refusals are not errors; they come back as [`SubmitOutcome::Failed`].
    pub async fn submit(&self, intent: OrderIntent) -> Result<SubmitOutcome, CommandError> {
        if intent.execution_type().is_exit() {
            return Err(CommandError::ExitNotAccepted);
        }

        let command_id = intent.command_id().clone();

        if intent.execution_type() == ExecutionType::Entry {
            let verdict = self.risk.can_execute(intent.client_id());
            if !verdict.clear {
                info!(%command_id, breaches = verdict.breaches.len(), "risk veto");
                return Ok(SubmitOutcome::RiskVetoed {
                    breaches: verdict.breaches,
                });
            }
        }

        match self.guard.check(&intent).await? {
            GuardDecision::Clear => {}
            GuardDecision::Blocked { layer, reason } => {
                info!(%command_id, %layer, %reason, "duplicate suppressed");
                return Ok(SubmitOutcome::Duplicate { layer, reason });
            }
        }

        // The claim is the atomic arbiter between submissions that cleared
        // the guard together; the loser reports as a memory-layer duplicate.
        let key = intent.logical_key();
        if !self.pending.try_claim(key.clone()) {
            return Ok(SubmitOutcome::Duplicate {
                layer: GuardLayer::Memory,
                reason: format!("command in flight for {key}"),
            });
        }

        let record = match self.repository.create(&intent).await {
            Ok(record) => record,
            Err(error) => {
                self.pending.release(&key);
                return Err(error.into());
            }
        };
        self.tracker.record(&command_id, TraceStage::Created, None).await;
        self.tracker
            .record(&command_id, TraceStage::Persisted, None)
            .await;

        match self.broker.place_order(PlaceOrderParams::from_intent(&intent)).await {
            Ok(broker_order_id) => {
                let record = self
                    .repository
                    .update_status(&command_id, StatusUpdate::sent(broker_order_id.clone()))
                    .await?;
                self.tracker
                    .record(
                        &command_id,
                        TraceStage::SentToBroker,
                        Some(format!("broker_order_id={broker_order_id}")),
                    )
                    .await;
                self.risk.record_entry(intent.client_id());
                info!(%command_id, %broker_order_id, "order sent");
                Ok(SubmitOutcome::Accepted(record))
            }
            Err(error) => {
                let reason = failure_reason(&error);
                let record = self
                    .repository
                    .update_status(&command_id, StatusUpdate::failed(reason.clone()))
                    .await?;
                self.pending.release(&key);
                self.tracker
                    .record(&command_id, TraceStage::Failed, Some(reason.clone()))
                    .await;
                warn!(%command_id, %reason, "order failed at broker");
                Ok(SubmitOutcome::Failed(record))
            }
        }
    }

    /// Record an exit intent for audit without touching the broker.
    ///
    /// The watcher owns the broker path for exits; this only persists the
    /// intent so the trail shows who asked for the exit and when.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::ExitNotAccepted`] inverted: only exit
    /// intents may be registered. Repository failures propagate.
    pub async fn register(&self, intent: OrderIntent) -> Result<OrderRecord, CommandError> {
        if !intent.execution_type().is_exit() {
            return Err(CommandError::ExitNotAccepted);
        }
        let record = self.repository.create(&intent).await?;
        self.tracker
            .record(intent.command_id(), TraceStage::Registered, None)
            .await;
        Ok(record)
    }

    /// Current record for a command, if one exists.
    ///
    /// # Errors
    ///
    /// Repository failures propagate.
    pub async fn lookup(&self, command_id: &CommandId) -> Result<Option<OrderRecord>, CommandError> {
        Ok(self.repository.get_by_command_id(command_id).await?)
    }

    /// Audit trail for a command.
    pub async fn trail(&self, command_id: &CommandId) -> Vec<TraceEvent> {
        self.tracker.trail(command_id).await
    }
}

fn failure_reason(error: &BrokerError) -> String {
    match error {
        BrokerError::Rejected { reason } => format!("rejected: {reason}"),
        BrokerError::Transport { message } => format!("transport: {message}"),
        BrokerError::NotFound { broker_order_id } => {
            format!("not found: {broker_order_id}")
        }
    }
}
