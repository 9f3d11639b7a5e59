//! Intent Tracker
//!
//! Correlates every intent across the pipeline stages it passes through.
//! Pure observability: it holds no control authority, and a failing sink
//! degrades to a log line rather than failing the order path.

use std::sync::Arc;
use tracing::warn;

use crate::application::ports::{TraceEvent, TraceSinkPort, TraceStage};
use crate::domain::shared::CommandId;

/// Append-only audit log over a trace sink.
pub struct IntentTracker<T: TraceSinkPort> {
    sink: Arc<T>,
}

impl<T: TraceSinkPort> IntentTracker<T> {
    /// Create a tracker over `sink`.
    #[must_use]
    pub fn new(sink: Arc<T>) -> Self {
        Self { sink }
    }

    /// Record that `command_id` reached `stage`.
    pub async fn record(&self, command_id: &CommandId, stage: TraceStage, detail: Option<String>) {
        let mut event = TraceEvent::new(command_id.clone(), stage);
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        if let Err(error) = self.sink.append(event).await {
            warn!(%command_id, %stage, %error, "trace append failed, event dropped");
        }
    }

    /// Full trail for one intent, oldest first. Empty on sink failure.
    pub async fn trail(&self, command_id: &CommandId) -> Vec<TraceEvent> {
        match self.sink.trail(command_id).await {
            Ok(events) => events,
            Err(error) => {
                warn!(%command_id, %error, "trace trail query failed");
                Vec::new()
            }
        }
    }
}

impl<T: TraceSinkPort> Clone for IntentTracker<T> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}
