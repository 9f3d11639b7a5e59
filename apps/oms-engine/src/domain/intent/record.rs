//! Order record: the mutable lifecycle projection of an intent.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::IntentError;
use super::intent::OrderIntent;
use super::value_objects::OrderStatus;
use crate::domain::shared::{BrokerOrderId, Timestamp};

/// A requested status write against a record.
///
/// Repositories apply these atomically per record; an update that would
/// regress the lifecycle is rejected wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Target status.
    pub status: OrderStatus,
    /// Broker order ID, set when the broker accepts the order.
    pub broker_order_id: Option<BrokerOrderId>,
    /// Cumulative filled quantity reported by the broker.
    pub filled_qty: Option<u32>,
    /// Average fill price reported by the broker.
    pub avg_price: Option<Decimal>,
    /// Failure reason, kept verbatim on FAILED records.
    pub failure_reason: Option<String>,
}

impl StatusUpdate {
    /// Update for a broker-accepted order.
    #[must_use]
    pub const fn sent(broker_order_id: BrokerOrderId) -> Self {
        Self {
            status: OrderStatus::SentToBroker,
            broker_order_id: Some(broker_order_id),
            filled_qty: None,
            avg_price: None,
            failure_reason: None,
        }
    }

    /// Update for a broker-confirmed fill.
    #[must_use]
    pub const fn executed(filled_qty: u32, avg_price: Decimal) -> Self {
        Self {
            status: OrderStatus::Executed,
            broker_order_id: None,
            filled_qty: Some(filled_qty),
            avg_price: Some(avg_price),
            failure_reason: None,
        }
    }

    /// Update for a rejected, cancelled or errored order.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: OrderStatus::Failed,
            broker_order_id: None,
            filled_qty: None,
            avg_price: None,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Parameters for reconstituting a record from storage.
#[derive(Debug, Clone)]
pub struct ReconstitutedRecordParams {
    /// The immutable intent.
    pub intent: OrderIntent,
    /// Current status.
    pub status: OrderStatus,
    /// Broker order ID if assigned.
    pub broker_order_id: Option<BrokerOrderId>,
    /// Cumulative filled quantity.
    pub filled_qty: u32,
    /// Average fill price if any fills were reported.
    pub avg_price: Option<Decimal>,
    /// Failure reason on FAILED records.
    pub failure_reason: Option<String>,
    /// Last update timestamp.
    pub updated_at: Timestamp,
}

/// Durable lifecycle state of one accepted intent.
///
/// The intent itself never changes; everything the broker teaches us about
/// it lands here under the monotonic status lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    intent: OrderIntent,
    status: OrderStatus,
    broker_order_id: Option<BrokerOrderId>,
    filled_qty: u32,
    avg_price: Option<Decimal>,
    failure_reason: Option<String>,
    updated_at: Timestamp,
}

impl OrderRecord {
    /// Open a fresh record in CREATED for an accepted intent.
    #[must_use]
    pub fn open(intent: OrderIntent) -> Self {
        let updated_at = intent.created_at();
        Self {
            intent,
            status: OrderStatus::Created,
            broker_order_id: None,
            filled_qty: 0,
            avg_price: None,
            failure_reason: None,
            updated_at,
        }
    }

    /// Rebuild a record from stored state.
    #[must_use]
    pub fn reconstitute(params: ReconstitutedRecordParams) -> Self {
        Self {
            intent: params.intent,
            status: params.status,
            broker_order_id: params.broker_order_id,
            filled_qty: params.filled_qty,
            avg_price: params.avg_price,
            failure_reason: params.failure_reason,
            updated_at: params.updated_at,
        }
    }

    /// Get the immutable intent.
    #[must_use]
    pub const fn intent(&self) -> &OrderIntent {
        &self.intent
    }

    /// Get the current status.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Get the broker order ID.
    #[must_use]
    pub const fn broker_order_id(&self) -> Option<&BrokerOrderId> {
        self.broker_order_id.as_ref()
    }

    /// Get the cumulative filled quantity.
    #[must_use]
    pub const fn filled_qty(&self) -> u32 {
        self.filled_qty
    }

    /// Get the average fill price.
    #[must_use]
    pub const fn avg_price(&self) -> Option<Decimal> {
        self.avg_price
    }

    /// Get the failure reason.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Get the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Apply a status update, enforcing the monotonic lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::InvalidTransition`] if the update would
    /// regress or skip the lifecycle, or violate a fill invariant.
    pub fn apply(&mut self, update: &StatusUpdate) -> Result<(), IntentError> {
        if !self.status.can_transition_to(update.status) {
            return Err(IntentError::InvalidTransition {
                from: self.status,
                to: update.status,
            });
        }

        if update.status == OrderStatus::Executed
            && self.broker_order_id.is_none()
            && update.broker_order_id.is_none()
        {
            // An EXECUTED record without a broker ID cannot exist.
            return Err(IntentError::InvalidTransition {
                from: self.status,
                to: update.status,
            });
        }

        if let Some(filled) = update.filled_qty {
            if filled > self.intent.quantity() {
                return Err(IntentError::InvalidIntent {
                    field: "filled_qty".to_string(),
                    message: format!(
                        "Filled {filled} exceeds intent quantity {}",
                        self.intent.quantity()
                    ),
                });
            }
            self.filled_qty = filled;
        }

        if update.broker_order_id.is_some() {
            self.broker_order_id = update.broker_order_id.clone();
        }
        if update.avg_price.is_some() {
            self.avg_price = update.avg_price;
        }
        if update.failure_reason.is_some() {
            self.failure_reason = update.failure_reason.clone();
        }

        self.status = update.status;
        self.updated_at = Timestamp::now();

        Ok(())
    }

    /// Mark the record accepted by the broker.
    ///
    /// # Errors
    ///
    /// Returns error unless the record is CREATED (or refreshing).
    pub fn mark_sent(&mut self, broker_order_id: BrokerOrderId) -> Result<(), IntentError> {
        self.apply(&StatusUpdate::sent(broker_order_id))
    }

    /// Mark the record executed with broker-reported fill details.
    ///
    /// # Errors
    ///
    /// Returns error unless the record is SENT_TO_BROKER (or refreshing).
    pub fn mark_executed(&mut self, filled_qty: u32, avg_price: Decimal) -> Result<(), IntentError> {
        self.apply(&StatusUpdate::executed(filled_qty, avg_price))
    }

    /// Mark the record failed, preserving the reason.
    ///
    /// # Errors
    ///
    /// Returns error if the record is already EXECUTED.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), IntentError> {
        self.apply(&StatusUpdate::failed(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::value_objects::{ExecutionType, IntentSource, OrderKind, Side};
    use crate::domain::intent::IntentParams;
    use crate::domain::shared::{ClientId, CommandId, Exchange, Product, Symbol};
    use rust_decimal_macros::dec;

    fn record() -> OrderRecord {
        let intent = OrderIntent::new(IntentParams {
            command_id: CommandId::new("cmd-1"),
            client_id: ClientId::new("ZD0412"),
            execution_type: ExecutionType::Entry,
            exchange: Exchange::Nfo,
            symbol: Symbol::new("NIFTY25MAR23400CE"),
            side: Side::Sell,
            quantity: 75,
            order_kind: OrderKind::Market,
            price: None,
            trigger_price: None,
            stop_loss: Some(dec!(210.00)),
            target: None,
            product: Product::Nrml,
            source: IntentSource::Strategy,
        })
        .unwrap();
        OrderRecord::open(intent)
    }

    #[test]
    fn record_opens_created() {
        let rec = record();
        assert_eq!(rec.status(), OrderStatus::Created);
        assert_eq!(rec.filled_qty(), 0);
        assert!(rec.broker_order_id().is_none());
    }

    #[test]
    fn record_full_lifecycle() {
        let mut rec = record();
        rec.mark_sent(BrokerOrderId::new("bo-1")).unwrap();
        assert_eq!(rec.status(), OrderStatus::SentToBroker);
        assert_eq!(rec.broker_order_id().unwrap().as_str(), "bo-1");

        rec.mark_executed(75, dec!(182.50)).unwrap();
        assert_eq!(rec.status(), OrderStatus::Executed);
        assert_eq!(rec.filled_qty(), 75);
        assert_eq!(rec.avg_price(), Some(dec!(182.50)));
    }

    #[test]
    fn record_created_can_fail_directly() {
        let mut rec = record();
        rec.mark_failed("broker transport error").unwrap();
        assert_eq!(rec.status(), OrderStatus::Failed);
        assert_eq!(rec.failure_reason(), Some("broker transport error"));
    }

    #[test]
    fn record_sent_can_fail() {
        let mut rec = record();
        rec.mark_sent(BrokerOrderId::new("bo-1")).unwrap();
        rec.mark_failed("REJECTED: insufficient margin").unwrap();
        assert_eq!(rec.status(), OrderStatus::Failed);
    }

    #[test]
    fn record_cannot_execute_from_created() {
        let mut rec = record();
        let err = rec.mark_executed(75, dec!(182.50)).unwrap_err();
        assert_eq!(
            err,
            IntentError::InvalidTransition {
                from: OrderStatus::Created,
                to: OrderStatus::Executed,
            }
        );
    }

    #[test]
    fn record_terminal_states_reject_writes() {
        let mut rec = record();
        rec.mark_sent(BrokerOrderId::new("bo-1")).unwrap();
        rec.mark_executed(75, dec!(182.50)).unwrap();

        assert!(rec.mark_failed("late reject").is_err());
        assert!(rec.mark_sent(BrokerOrderId::new("bo-2")).is_err());
        // Refreshing fill details on an executed record is legal.
        assert!(rec.mark_executed(75, dec!(182.55)).is_ok());
        assert_eq!(rec.avg_price(), Some(dec!(182.55)));
    }

    #[test]
    fn record_failed_is_terminal() {
        let mut rec = record();
        rec.mark_failed("rejected").unwrap();
        assert!(rec.mark_sent(BrokerOrderId::new("bo-1")).is_err());
        assert!(rec.mark_executed(75, dec!(1)).is_err());
    }

    #[test]
    fn record_rejects_overfill() {
        let mut rec = record();
        rec.mark_sent(BrokerOrderId::new("bo-1")).unwrap();
        let err = rec.mark_executed(150, dec!(182.50)).unwrap_err();
        assert!(matches!(err, IntentError::InvalidIntent { field, .. } if field == "filled_qty"));
    }

    #[test]
    fn record_executed_requires_broker_id() {
        let mut rec = record();
        // Skip mark_sent by applying a raw update with SENT status but no id,
        // then try to execute: the id must have arrived by then.
        let update = StatusUpdate {
            status: OrderStatus::SentToBroker,
            broker_order_id: None,
            filled_qty: None,
            avg_price: None,
            failure_reason: None,
        };
        rec.apply(&update).unwrap();
        assert!(rec.mark_executed(75, dec!(182.50)).is_err());
    }

    #[test]
    fn record_reconstitute_preserves_state() {
        let mut rec = record();
        rec.mark_sent(BrokerOrderId::new("bo-1")).unwrap();

        let rebuilt = OrderRecord::reconstitute(ReconstitutedRecordParams {
            intent: rec.intent().clone(),
            status: rec.status(),
            broker_order_id: rec.broker_order_id().cloned(),
            filled_qty: rec.filled_qty(),
            avg_price: rec.avg_price(),
            failure_reason: None,
            updated_at: rec.updated_at(),
        });
        assert_eq!(rebuilt.status(), OrderStatus::SentToBroker);
        assert_eq!(rebuilt.broker_order_id().unwrap().as_str(), "bo-1");
    }
}
