//! In-memory persistence adapters.
//!
//! Back the same contracts as the SQLite adapters without touching disk.
//! Suitable for tests and dry runs, not for surviving a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{TraceError, TraceEvent, TraceSinkPort, TraceStage};
use crate::domain::intent::{
    IntentError, LogicalKey, OrderIntent, OrderRecord, OrderRepository, OrderStatus, StatusUpdate,
};
use crate::domain::shared::{BrokerOrderId, ClientId, CommandId};

/// In-memory [`OrderRepository`].
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    records: RwLock<HashMap<String, OrderRecord>>,
}

impl InMemoryOrderRepository {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True when no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, intent: &OrderIntent) -> Result<OrderRecord, IntentError> {
        let mut records = self.records.write();
        let key = intent.command_id().as_str().to_string();
        if records.contains_key(&key) {
            return Err(IntentError::DuplicateCommandId { command_id: key });
        }
        let record = OrderRecord::open(intent.clone());
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn update_status(
        &self,
        command_id: &CommandId,
        update: StatusUpdate,
    ) -> Result<OrderRecord, IntentError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(command_id.as_str())
            .ok_or_else(|| IntentError::UnknownCommand {
                command_id: command_id.as_str().to_string(),
            })?;
        record.apply(&update)?;
        Ok(record.clone())
    }

    async fn get_by_command_id(
        &self,
        command_id: &CommandId,
    ) -> Result<Option<OrderRecord>, IntentError> {
        Ok(self.records.read().get(command_id.as_str()).cloned())
    }

    async fn get_by_broker_id(
        &self,
        broker_order_id: &BrokerOrderId,
    ) -> Result<Option<OrderRecord>, IntentError> {
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.broker_order_id() == Some(broker_order_id))
            .cloned())
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<OrderRecord>, IntentError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.status() == status)
            .cloned()
            .collect())
    }

    async fn find_active(&self) -> Result<Vec<OrderRecord>, IntentError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.status().is_active())
            .cloned()
            .collect())
    }

    async fn find_live_by_logical_key(
        &self,
        key: &LogicalKey,
    ) -> Result<Vec<OrderRecord>, IntentError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.status() != OrderStatus::Failed && &r.intent().logical_key() == key)
            .cloned()
            .collect())
    }

    async fn find_watchable_entries(
        &self,
        client_id: &ClientId,
    ) -> Result<Vec<OrderRecord>, IntentError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| {
                r.status() == OrderStatus::Executed
                    && r.intent().execution_type().opens_exposure()
                    && r.intent().has_exit_levels()
                    && r.intent().client_id() == client_id
            })
            .cloned()
            .collect())
    }
}

/// In-memory [`TraceSinkPort`] that keeps every event for inspection.
#[derive(Debug, Default)]
pub struct InMemoryTraceSink {
    events: RwLock<HashMap<String, Vec<TraceEvent>>>,
}

impl InMemoryTraceSink {
    /// An empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
        }
    }

    /// Stages recorded for a command, in append order.
    #[must_use]
    pub fn stages(&self, command_id: &CommandId) -> Vec<TraceStage> {
        self.events
            .read()
            .get(command_id.as_str())
            .map(|events| events.iter().map(|e| e.stage).collect())
            .unwrap_or_default()
    }

    /// Total events across all commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().values().map(Vec::len).sum()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TraceSinkPort for InMemoryTraceSink {
    async fn append(&self, event: TraceEvent) -> Result<(), TraceError> {
        self.events
            .write()
            .entry(event.command_id.as_str().to_string())
            .or_default()
            .push(event);
        Ok(())
    }

    async fn trail(&self, command_id: &CommandId) -> Result<Vec<TraceEvent>, TraceError> {
        Ok(self
            .events
            .read()
            .get(command_id.as_str())
            .cloned()
            .unwrap_or_default())
    }
}
