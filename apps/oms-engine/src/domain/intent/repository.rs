//! Order Repository Trait
//!
//! Defines the persistence abstraction for order records.
//! Implemented by adapters in the infrastructure layer.

use async_trait::async_trait;

use super::errors::IntentError;
use super::intent::OrderIntent;
use super::record::{OrderRecord, StatusUpdate};
use super::value_objects::{LogicalKey, OrderStatus};
use crate::domain::shared::{BrokerOrderId, ClientId, CommandId};

/// Repository trait for order record persistence.
///
/// Implementations must apply each [`StatusUpdate`] atomically per record:
/// two concurrent writers to the same command ID serialize, writers to
/// different records do not contend, and a rejected transition leaves the
/// row untouched.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a new record in CREATED for this intent.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::DuplicateCommandId`] if a record with this
    /// command ID already exists, or [`IntentError::Storage`] if
    /// persistence fails.
    async fn create(&self, intent: &OrderIntent) -> Result<OrderRecord, IntentError>;

    /// Apply a status update to an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::UnknownCommand`] if no record exists,
    /// [`IntentError::InvalidTransition`] if the update would regress the
    /// lifecycle, or [`IntentError::Storage`] if persistence fails.
    async fn update_status(
        &self,
        command_id: &CommandId,
        update: StatusUpdate,
    ) -> Result<OrderRecord, IntentError>;

    /// Find a record by command ID. Absent records are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn get_by_command_id(
        &self,
        command_id: &CommandId,
    ) -> Result<Option<OrderRecord>, IntentError>;

    /// Find a record by the broker's order ID. Absent records are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn get_by_broker_id(
        &self,
        broker_order_id: &BrokerOrderId,
    ) -> Result<Option<OrderRecord>, IntentError>;

    /// Find all records with a given status.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<OrderRecord>, IntentError>;

    /// Find all active (non-terminal) records.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_active(&self) -> Result<Vec<OrderRecord>, IntentError>;

    /// Find non-failed records sharing a logical key.
    ///
    /// This is the storage layer of the duplicate guard: a CREATED,
    /// SENT_TO_BROKER or EXECUTED record for the key means the action
    /// already happened or is in flight.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_live_by_logical_key(
        &self,
        key: &LogicalKey,
    ) -> Result<Vec<OrderRecord>, IntentError>;

    /// Find EXECUTED entry/adjust records for a client that carry exit
    /// levels. The watcher adopts these into tracking.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_watchable_entries(
        &self,
        client_id: &ClientId,
    ) -> Result<Vec<OrderRecord>, IntentError>;
}
