//! Trace Sink Port (Driven Port)
//!
//! Append-only audit trail of every intent's journey. Sinks must never
//! mutate or delete past events; replays and postmortems depend on the
//! record being exactly what happened in order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::shared::{CommandId, Timestamp};

/// Pipeline stage an intent passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceStage {
    /// Intent accepted by the command service.
    Created,
    /// Record durably written.
    Persisted,
    /// Pushed to the broker.
    SentToBroker,
    /// Broker confirmed the fill.
    Confirmed,
    /// Status corrected from broker state at startup or during polling.
    Reconciled,
    /// Terminal failure recorded.
    Failed,
    /// Externally placed order registered for tracking.
    Registered,
    /// Broker position with no engine record observed.
    Orphaned,
    /// Record stuck in a non-terminal status past the staleness window.
    Stale,
}

impl fmt::Display for TraceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Persisted => "PERSISTED",
            Self::SentToBroker => "SENT_TO_BROKER",
            Self::Confirmed => "CONFIRMED",
            Self::Reconciled => "RECONCILED",
            Self::Failed => "FAILED",
            Self::Registered => "REGISTERED",
            Self::Orphaned => "ORPHANED",
            Self::Stale => "STALE",
        };
        write!(f, "{s}")
    }
}

/// One audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Intent the event belongs to.
    pub command_id: CommandId,
    /// Stage reached.
    pub stage: TraceStage,
    /// Free-form context: broker IDs, failure reasons, symbols.
    pub detail: Option<String>,
    /// When the stage was reached.
    pub at: Timestamp,
}

impl TraceEvent {
    /// Event with no detail.
    #[must_use]
    pub fn new(command_id: CommandId, stage: TraceStage) -> Self {
        Self {
            command_id,
            stage,
            detail: None,
            at: Timestamp::now(),
        }
    }

    /// Attach detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Trace sink error.
#[derive(Debug, Clone, Error)]
pub enum TraceError {
    /// The sink could not append.
    #[error("Trace sink failure: {message}")]
    Sink {
        /// Error details.
        message: String,
    },
}

/// Port for appending audit events.
#[async_trait]
pub trait TraceSinkPort: Send + Sync {
    /// Append one event. Must not reorder or overwrite prior events.
    async fn append(&self, event: TraceEvent) -> Result<(), TraceError>;

    /// Events for one intent, in append order.
    async fn trail(&self, command_id: &CommandId) -> Result<Vec<TraceEvent>, TraceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_builder_attaches_detail() {
        let event = TraceEvent::new(CommandId::new("cmd-9"), TraceStage::SentToBroker)
            .with_detail("broker_order_id=240212000412");
        assert_eq!(event.stage, TraceStage::SentToBroker);
        assert_eq!(event.detail.as_deref(), Some("broker_order_id=240212000412"));
    }

    #[test]
    fn stage_display_matches_wire_names() {
        assert_eq!(format!("{}", TraceStage::SentToBroker), "SENT_TO_BROKER");
        assert_eq!(format!("{}", TraceStage::Orphaned), "ORPHANED");
    }
}
