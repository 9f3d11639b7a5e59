//! HTTP response DTOs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{TraceEvent, TraceStage};
use crate::domain::intent::{
    ExecutionType, IntentSource, OrderKind, OrderRecord, OrderStatus, Side,
};
use crate::domain::shared::{Exchange, Product, Timestamp};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Application version.
    pub version: String,
}

/// Error body for failed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

/// Projection of one order record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    /// Idempotency key of the intent.
    pub command_id: String,
    /// Trading account.
    pub client_id: String,
    /// ENTRY, ADJUST or EXIT.
    pub execution_type: ExecutionType,
    /// Exchange segment.
    pub exchange: Exchange,
    /// Instrument symbol.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Quantity in units.
    pub quantity: u32,
    /// Order kind.
    pub order_kind: OrderKind,
    /// Limit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// Trigger price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<Decimal>,
    /// Stop-loss level carried by the intent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    /// Target level carried by the intent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Decimal>,
    /// Product the position books under.
    pub product: Product,
    /// Which subsystem authored the intent.
    pub source: IntentSource,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Broker order ID once assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_order_id: Option<String>,
    /// Cumulative filled quantity.
    pub filled_qty: u32,
    /// Average fill price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<Decimal>,
    /// Failure reason on FAILED records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// When the intent was accepted.
    pub created_at: Timestamp,
    /// Last status write.
    pub updated_at: Timestamp,
}

impl OrderView {
    /// Project a record for the wire.
    #[must_use]
    pub fn from_record(record: &OrderRecord) -> Self {
        let intent = record.intent();
        Self {
            command_id: intent.command_id().as_str().to_string(),
            client_id: intent.client_id().as_str().to_string(),
            execution_type: intent.execution_type(),
            exchange: intent.exchange(),
            symbol: intent.symbol().as_str().to_string(),
            side: intent.side(),
            quantity: intent.quantity(),
            order_kind: intent.order_kind(),
            price: intent.price(),
            trigger_price: intent.trigger_price(),
            stop_loss: intent.stop_loss(),
            target: intent.target(),
            product: intent.product(),
            source: intent.source(),
            status: record.status(),
            broker_order_id: record.broker_order_id().map(|id| id.as_str().to_string()),
            filled_qty: record.filled_qty(),
            avg_price: record.avg_price(),
            failure_reason: record.failure_reason().map(ToString::to_string),
            created_at: intent.created_at(),
            updated_at: record.updated_at(),
        }
    }
}

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceView {
    /// Stage reached.
    pub stage: TraceStage,
    /// Free-form context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// When the stage was reached.
    pub at: Timestamp,
}

impl TraceView {
    /// Project an event for the wire.
    #[must_use]
    pub fn from_event(event: &TraceEvent) -> Self {
        Self {
            stage: event.stage,
            detail: event.detail.clone(),
            at: event.at,
        }
    }
}

/// Response from an intent submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitIntentResponse {
    /// Idempotency key the submission ran under.
    pub command_id: String,
    /// ACCEPTED, DUPLICATE, RISK_VETOED or FAILED.
    pub outcome: String,
    /// Record state, present for ACCEPTED and FAILED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderView>,
    /// Guard layer that objected, present for DUPLICATE.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    /// What the guard found, present for DUPLICATE.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Breaches behind the veto, present for RISK_VETOED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaches: Option<Vec<String>>,
}

/// Response from an exit request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenResponse {
    /// Whether the request was queued for the watcher.
    pub queued: bool,
}

/// Record plus its audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetailResponse {
    /// Current record state.
    pub order: OrderView,
    /// Audit events in append order.
    pub trail: Vec<TraceView>,
}
