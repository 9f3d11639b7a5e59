//! SQLite persistence.
//!
//! Orders, runs and the intent trace live in one SQLite file. Status writes
//! go through a transaction that re-reads the row and applies the update via
//! the domain record, so the monotonic lifecycle holds even against a
//! restarted or concurrent engine.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::application::ports::{TraceError, TraceEvent, TraceSinkPort, TraceStage};
use crate::domain::intent::{
    IntentError, IntentParams, LogicalKey, OrderIntent, OrderRecord, OrderRepository, OrderStatus,
    ReconstitutedRecordParams, StatusUpdate,
};
use crate::domain::shared::{
    BrokerOrderId, ClientId, CommandId, Exchange, Product, RunId, Symbol, Timestamp,
};

/// Open the database, creating the file if missing, and run migrations.
///
/// The pool is capped at one connection: SQLite allows a single writer at a
/// time, and one pooled connection serializes status writes without busy
/// retries.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

fn storage(message: impl fmt::Display) -> IntentError {
    IntentError::Storage {
        message: message.to_string(),
    }
}

fn sink(message: impl fmt::Display) -> TraceError {
    TraceError::Sink {
        message: message.to_string(),
    }
}

/// Decode a SCREAMING_SNAKE_CASE column back into its enum.
fn decode_enum<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_owned()))
        .map_err(|e| format!("bad {column} value '{raw}': {e}"))
}

fn decode_decimal(column: &str, raw: Option<String>) -> Result<Option<Decimal>, String> {
    raw.map(|s| Decimal::from_str(&s).map_err(|e| format!("bad {column} value '{s}': {e}")))
        .transpose()
}

fn decode_timestamp(column: &str, raw: &str) -> Result<Timestamp, String> {
    Timestamp::parse(raw).map_err(|e| format!("bad {column} value '{raw}': {e}"))
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    command_id: String,
    client_id: String,
    execution_type: String,
    exchange: String,
    symbol: String,
    side: String,
    quantity: u32,
    order_kind: String,
    price: Option<String>,
    trigger_price: Option<String>,
    stop_loss: Option<String>,
    target: Option<String>,
    product: String,
    source: String,
    status: String,
    broker_order_id: Option<String>,
    filled_qty: u32,
    avg_price: Option<String>,
    failure_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl OrderRow {
    fn into_record(self) -> Result<OrderRecord, IntentError> {
        let created_at = decode_timestamp("created_at", &self.created_at).map_err(storage)?;
        let intent = OrderIntent::reconstitute(
            IntentParams {
                command_id: CommandId::new(self.command_id),
                client_id: ClientId::new(self.client_id),
                execution_type: decode_enum("execution_type", &self.execution_type)
                    .map_err(storage)?,
                exchange: decode_enum("exchange", &self.exchange).map_err(storage)?,
                symbol: Symbol::new(self.symbol),
                side: decode_enum("side", &self.side).map_err(storage)?,
                quantity: self.quantity,
                order_kind: decode_enum("order_kind", &self.order_kind).map_err(storage)?,
                price: decode_decimal("price", self.price).map_err(storage)?,
                trigger_price: decode_decimal("trigger_price", self.trigger_price)
                    .map_err(storage)?,
                stop_loss: decode_decimal("stop_loss", self.stop_loss).map_err(storage)?,
                target: decode_decimal("target", self.target).map_err(storage)?,
                product: decode_enum("product", &self.product).map_err(storage)?,
                source: decode_enum("source", &self.source).map_err(storage)?,
            },
            created_at,
        );
        Ok(OrderRecord::reconstitute(ReconstitutedRecordParams {
            intent,
            status: decode_enum("status", &self.status).map_err(storage)?,
            broker_order_id: self.broker_order_id.map(BrokerOrderId::new),
            filled_qty: self.filled_qty,
            avg_price: decode_decimal("avg_price", self.avg_price).map_err(storage)?,
            failure_reason: self.failure_reason,
            updated_at: decode_timestamp("updated_at", &self.updated_at).map_err(storage)?,
        }))
    }
}

fn rows_to_records(rows: Vec<OrderRow>) -> Result<Vec<OrderRecord>, IntentError> {
    rows.into_iter().map(OrderRow::into_record).collect()
}

/// Order records in the `orders` table.
#[derive(Debug, Clone)]
pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    /// Repository over an already-migrated pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn create(&self, intent: &OrderIntent) -> Result<OrderRecord, IntentError> {
        let record = OrderRecord::open(intent.clone());
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let exists = sqlx::query("SELECT 1 FROM orders WHERE command_id = ?")
            .bind(intent.command_id().as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?;
        if exists.is_some() {
            return Err(IntentError::DuplicateCommandId {
                command_id: intent.command_id().as_str().to_string(),
            });
        }

        sqlx::query(
            r"
            INSERT INTO orders (
                command_id, client_id, execution_type, exchange, symbol, side,
                quantity, order_kind, price, trigger_price, stop_loss, target,
                product, source, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(intent.command_id().as_str())
        .bind(intent.client_id().as_str())
        .bind(intent.execution_type().to_string())
        .bind(intent.exchange().as_str())
        .bind(intent.symbol().as_str())
        .bind(intent.side().to_string())
        .bind(intent.quantity())
        .bind(intent.order_kind().as_str())
        .bind(intent.price().map(|d| d.to_string()))
        .bind(intent.trigger_price().map(|d| d.to_string()))
        .bind(intent.stop_loss().map(|d| d.to_string()))
        .bind(intent.target().map(|d| d.to_string()))
        .bind(intent.product().as_str())
        .bind(intent.source().to_string())
        .bind(intent.created_at().to_rfc3339())
        .bind(record.updated_at().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(record)
    }

    async fn update_status(
        &self,
        command_id: &CommandId,
        update: StatusUpdate,
    ) -> Result<OrderRecord, IntentError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE command_id = ?")
            .bind(command_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
            .ok_or_else(|| IntentError::UnknownCommand {
                command_id: command_id.as_str().to_string(),
            })?;

        let mut record = row.into_record()?;
        let prior = record.status();
        record.apply(&update)?;

        let result = sqlx::query(
            r"
            UPDATE orders
            SET status = ?, broker_order_id = ?, filled_qty = ?, avg_price = ?,
                failure_reason = ?, updated_at = ?
            WHERE command_id = ? AND status = ?
            ",
        )
        .bind(record.status().to_string())
        .bind(record.broker_order_id().map(BrokerOrderId::as_str))
        .bind(record.filled_qty())
        .bind(record.avg_price().map(|d| d.to_string()))
        .bind(record.failure_reason())
        .bind(record.updated_at().to_rfc3339())
        .bind(command_id.as_str())
        .bind(prior.to_string())
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(storage(format!("record {command_id} moved concurrently")));
        }

        tx.commit().await.map_err(storage)?;
        Ok(record)
    }

    async fn get_by_command_id(
        &self,
        command_id: &CommandId,
    ) -> Result<Option<OrderRecord>, IntentError> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE command_id = ?")
            .bind(command_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .map(OrderRow::into_record)
            .transpose()
    }

    async fn get_by_broker_id(
        &self,
        broker_order_id: &BrokerOrderId,
    ) -> Result<Option<OrderRecord>, IntentError> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE broker_order_id = ?")
            .bind(broker_order_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .map(OrderRow::into_record)
            .transpose()
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<OrderRecord>, IntentError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE status = ? ORDER BY created_at",
        )
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows_to_records(rows)
    }

    async fn find_active(&self) -> Result<Vec<OrderRecord>, IntentError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT * FROM orders
            WHERE status IN ('CREATED', 'SENT_TO_BROKER')
            ORDER BY created_at
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows_to_records(rows)
    }

    async fn find_live_by_logical_key(
        &self,
        key: &LogicalKey,
    ) -> Result<Vec<OrderRecord>, IntentError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT * FROM orders
            WHERE status != 'FAILED'
              AND client_id = ? AND exchange = ? AND symbol = ?
              AND product = ? AND execution_type = ?
            ORDER BY created_at
            ",
        )
        .bind(key.client_id.as_str())
        .bind(key.exchange.as_str())
        .bind(key.symbol.as_str())
        .bind(key.product.as_str())
        .bind(key.execution_type.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows_to_records(rows)
    }

    async fn find_watchable_entries(
        &self,
        client_id: &ClientId,
    ) -> Result<Vec<OrderRecord>, IntentError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT * FROM orders
            WHERE status = 'EXECUTED'
              AND execution_type IN ('ENTRY', 'ADJUST')
              AND client_id = ?
              AND (stop_loss IS NOT NULL OR target IS NOT NULL)
            ORDER BY created_at
            ",
        )
        .bind(client_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows_to_records(rows)
    }
}

#[derive(sqlx::FromRow)]
struct TraceRow {
    command_id: String,
    stage: String,
    detail: String,
    at: String,
}

impl TraceRow {
    fn into_event(self) -> Result<TraceEvent, TraceError> {
        let stage: TraceStage = decode_enum("stage", &self.stage).map_err(sink)?;
        Ok(TraceEvent {
            command_id: CommandId::new(self.command_id),
            stage,
            detail: (!self.detail.is_empty()).then_some(self.detail),
            at: decode_timestamp("at", &self.at).map_err(sink)?,
        })
    }
}

/// Intent trace events in the `intent_events` table, scoped to one run.
#[derive(Debug, Clone)]
pub struct SqliteTraceStore {
    pool: SqlitePool,
    run_id: RunId,
}

impl SqliteTraceStore {
    /// Trace store writing under `run_id`.
    #[must_use]
    pub fn new(pool: SqlitePool, run_id: RunId) -> Self {
        Self { pool, run_id }
    }
}

#[async_trait]
impl TraceSinkPort for SqliteTraceStore {
    async fn append(&self, event: TraceEvent) -> Result<(), TraceError> {
        sqlx::query(
            r"
            INSERT INTO intent_events (run_id, command_id, stage, detail, at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(self.run_id.as_str())
        .bind(event.command_id.as_str())
        .bind(event.stage.to_string())
        .bind(event.detail.unwrap_or_default())
        .bind(event.at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(sink)?;
        Ok(())
    }

    async fn trail(&self, command_id: &CommandId) -> Result<Vec<TraceEvent>, TraceError> {
        let rows = sqlx::query_as::<_, TraceRow>(
            r"
            SELECT command_id, stage, detail, at FROM intent_events
            WHERE command_id = ?
            ORDER BY event_id
            ",
        )
        .bind(command_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(sink)?;
        rows.into_iter().map(TraceRow::into_event).collect()
    }
}

/// Run registry rows: one per engine process lifetime.
#[derive(Debug, Clone)]
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    /// Run store over an already-migrated pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record the start of a run with its resolved config snapshot.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn open_run(
        &self,
        run_id: &RunId,
        engine_id: &str,
        mode: &str,
        config_json: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO runs (run_id, engine_id, mode, config_json, started_at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(run_id.as_str())
        .bind(engine_id)
        .bind(mode)
        .bind(config_json)
        .bind(Timestamp::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stamp a run as stopped.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn close_run(&self, run_id: &RunId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE runs SET stopped_at = ? WHERE run_id = ?")
            .bind(Timestamp::now().to_rfc3339())
            .bind(run_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::{ExecutionType, IntentSource, OrderKind, Side};
    use rust_decimal_macros::dec;
    use sqlx::Row;
    use tempfile::TempDir;

    async fn test_pool(dir: &TempDir) -> SqlitePool {
        let url = format!("sqlite:{}", dir.path().join("oms.db").display());
        connect(&url).await.unwrap()
    }

    fn entry_intent(command_id: &str, symbol: &str) -> OrderIntent {
        OrderIntent::new(IntentParams {
            command_id: CommandId::new(command_id),
            client_id: ClientId::new("ZD0412"),
            execution_type: ExecutionType::Entry,
            exchange: Exchange::Nfo,
            symbol: Symbol::new(symbol),
            side: Side::Sell,
            quantity: 75,
            order_kind: OrderKind::Market,
            price: None,
            trigger_price: None,
            stop_loss: Some(dec!(210.00)),
            target: Some(dec!(60.00)),
            product: Product::Nrml,
            source: IntentSource::Strategy,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn lifecycle_survives_reload() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir).await;
        let repo = SqliteOrderRepository::new(pool.clone());

        let intent = entry_intent("cmd-1", "NIFTY25MAR23400CE");
        repo.create(&intent).await.unwrap();
        repo.update_status(
            &CommandId::new("cmd-1"),
            StatusUpdate::sent(BrokerOrderId::new("240212000412")),
        )
        .await
        .unwrap();
        repo.update_status(
            &CommandId::new("cmd-1"),
            StatusUpdate::executed(75, dec!(118.5)),
        )
        .await
        .unwrap();

        // A fresh repository over the same file sees the full state.
        let reloaded = SqliteOrderRepository::new(pool);
        let record = reloaded
            .get_by_command_id(&CommandId::new("cmd-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), OrderStatus::Executed);
        assert_eq!(record.filled_qty(), 75);
        assert_eq!(record.avg_price(), Some(dec!(118.5)));
        assert_eq!(record.broker_order_id().unwrap().as_str(), "240212000412");
        assert_eq!(record.intent().created_at(), intent.created_at());
        assert_eq!(record.intent().stop_loss(), Some(dec!(210.00)));

        let by_broker = reloaded
            .get_by_broker_id(&BrokerOrderId::new("240212000412"))
            .await
            .unwrap();
        assert!(by_broker.is_some());
    }

    #[tokio::test]
    async fn duplicate_command_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let repo = SqliteOrderRepository::new(test_pool(&dir).await);

        let intent = entry_intent("cmd-1", "NIFTY25MAR23400CE");
        repo.create(&intent).await.unwrap();
        let err = repo.create(&intent).await.unwrap_err();
        assert!(matches!(err, IntentError::DuplicateCommandId { .. }));
    }

    #[tokio::test]
    async fn regression_leaves_row_untouched() {
        let dir = TempDir::new().unwrap();
        let repo = SqliteOrderRepository::new(test_pool(&dir).await);

        repo.create(&entry_intent("cmd-1", "NIFTY25MAR23400CE"))
            .await
            .unwrap();
        repo.update_status(
            &CommandId::new("cmd-1"),
            StatusUpdate::sent(BrokerOrderId::new("240212000412")),
        )
        .await
        .unwrap();
        repo.update_status(
            &CommandId::new("cmd-1"),
            StatusUpdate::executed(75, dec!(118.5)),
        )
        .await
        .unwrap();

        let err = repo
            .update_status(&CommandId::new("cmd-1"), StatusUpdate::failed("late reject"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntentError::InvalidTransition { .. }));

        let record = repo
            .get_by_command_id(&CommandId::new("cmd-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), OrderStatus::Executed);
        assert!(record.failure_reason().is_none());
    }

    #[tokio::test]
    async fn queries_filter_by_status_key_and_watchability() {
        let dir = TempDir::new().unwrap();
        let repo = SqliteOrderRepository::new(test_pool(&dir).await);

        let ce = entry_intent("cmd-ce", "NIFTY25MAR23400CE");
        let pe = entry_intent("cmd-pe", "NIFTY25MAR22800PE");
        repo.create(&ce).await.unwrap();
        repo.create(&pe).await.unwrap();

        repo.update_status(
            &CommandId::new("cmd-ce"),
            StatusUpdate::sent(BrokerOrderId::new("240212000001")),
        )
        .await
        .unwrap();
        repo.update_status(
            &CommandId::new("cmd-ce"),
            StatusUpdate::executed(75, dec!(118.5)),
        )
        .await
        .unwrap();

        assert_eq!(
            repo.find_by_status(OrderStatus::Created).await.unwrap().len(),
            1
        );
        assert_eq!(repo.find_active().await.unwrap().len(), 1);

        let live = repo.find_live_by_logical_key(&ce.logical_key()).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].intent().command_id().as_str(), "cmd-ce");

        let watchable = repo
            .find_watchable_entries(&ClientId::new("ZD0412"))
            .await
            .unwrap();
        assert_eq!(watchable.len(), 1);
        assert_eq!(watchable[0].intent().symbol().as_str(), "NIFTY25MAR23400CE");

        // Failing the PE record removes it from the live set for its key.
        repo.update_status(&CommandId::new("cmd-pe"), StatusUpdate::failed("rejected"))
            .await
            .unwrap();
        assert!(repo
            .find_live_by_logical_key(&pe.logical_key())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn trace_store_keeps_append_order() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir).await;
        let store = SqliteTraceStore::new(pool, RunId::new("run-1"));

        let id = CommandId::new("cmd-1");
        store
            .append(TraceEvent::new(id.clone(), TraceStage::Created))
            .await
            .unwrap();
        store
            .append(
                TraceEvent::new(id.clone(), TraceStage::SentToBroker)
                    .with_detail("broker_order_id=240212000412"),
            )
            .await
            .unwrap();

        let trail = store.trail(&id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].stage, TraceStage::Created);
        assert!(trail[0].detail.is_none());
        assert_eq!(trail[1].stage, TraceStage::SentToBroker);
        assert_eq!(
            trail[1].detail.as_deref(),
            Some("broker_order_id=240212000412")
        );
    }

    #[tokio::test]
    async fn run_rows_open_and_close() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir).await;
        let store = SqliteRunStore::new(pool.clone());

        let run_id = RunId::new("run-1");
        store
            .open_run(&run_id, "oms-engine", "paper", "{}")
            .await
            .unwrap();

        let row = sqlx::query("SELECT stopped_at FROM runs WHERE run_id = ?")
            .bind(run_id.as_str())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(row.get::<Option<String>, _>("stopped_at").is_none());

        store.close_run(&run_id).await.unwrap();
        let row = sqlx::query("SELECT stopped_at FROM runs WHERE run_id = ?")
            .bind(run_id.as_str())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(row.get::<Option<String>, _>("stopped_at").is_some());
    }
}
