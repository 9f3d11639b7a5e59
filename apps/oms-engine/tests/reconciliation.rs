//! Reconciliation Integration Tests
//!
//! Restart-shaped scenarios over the sqlite repository. A record parked in
//! SENT_TO_BROKER by a dead process is settled from broker state without
//! placing anything new, and broker rows unknown to the repository are
//! reported but never imported.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use oms_engine::application::ports::TraceStage;
use oms_engine::application::services::{
    CommandService, GuardLayer, IntentTracker, OrderWatcherService, PendingCommandSet,
    RiskManagerService, SubmitOutcome, WatcherConfig,
};
use oms_engine::domain::intent::{
    ExecutionType, IntentParams, IntentSource, OrderIntent, OrderKind, OrderRepository,
    OrderStatus, Side, StatusUpdate,
};
use oms_engine::domain::risk::RiskLimits;
use oms_engine::domain::shared::{BrokerOrderId, ClientId, CommandId, Exchange, Product, Symbol};
use oms_engine::infrastructure::broker::PaperBroker;
use oms_engine::infrastructure::persistence::{InMemoryTraceSink, SqliteOrderRepository, connect};
use rust_decimal_macros::dec;
use tempfile::TempDir;

fn client() -> ClientId {
    ClientId::new("ZD0412")
}

fn sell_entry(command_id: &str, symbol: &str) -> OrderIntent {
    OrderIntent::new(IntentParams {
        command_id: CommandId::new(command_id),
        client_id: client(),
        execution_type: ExecutionType::Entry,
        exchange: Exchange::Nfo,
        symbol: Symbol::new(symbol),
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
    .expect("entry intent should validate")
}

/// A watcher as the composition root would build it after a restart: fresh
/// in-memory state over whatever the repository and broker already hold.
fn restarted_watcher(
    repository: Arc<SqliteOrderRepository>,
    broker: Arc<PaperBroker>,
    sink: Arc<InMemoryTraceSink>,
) -> OrderWatcherService<SqliteOrderRepository, PaperBroker, InMemoryTraceSink> {
    let risk = RiskManagerService::new(Arc::clone(&broker));
    OrderWatcherService::new(
        client(),
        WatcherConfig::default(),
        repository,
        broker,
        IntentTracker::new(sink),
        Arc::new(PendingCommandSet::new()),
        risk.subscribe(),
    )
}

#[tokio::test]
async fn restart_settles_sent_records_without_replacing() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("oms.db").display());
    let pool = connect(&url).await.unwrap();

    // A previous process sent the order and died before the confirmation.
    let repository = Arc::new(SqliteOrderRepository::new(pool.clone()));
    repository
        .create(&sell_entry("cmd-boot-1", "NIFTY25MAR23400CE"))
        .await
        .unwrap();
    repository
        .update_status(
            &CommandId::new("cmd-boot-1"),
            StatusUpdate::sent(BrokerOrderId::new("240212000412")),
        )
        .await
        .unwrap();

    // The broker filled it in the meantime.
    let broker = Arc::new(PaperBroker::new());
    broker.seed_open_order(
        &client(),
        BrokerOrderId::new("240212000412"),
        Symbol::new("NIFTY25MAR23400CE"),
        Product::Nrml,
        Side::Sell,
    );
    broker.complete_order(&BrokerOrderId::new("240212000412"), 75, dec!(182.55));

    let sink = Arc::new(InMemoryTraceSink::new());
    let watcher = restarted_watcher(
        Arc::new(SqliteOrderRepository::new(pool.clone())),
        Arc::clone(&broker),
        Arc::clone(&sink),
    );
    watcher.cycle().await;

    // Settled from broker state, nothing placed.
    let record = repository
        .get_by_command_id(&CommandId::new("cmd-boot-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status(), OrderStatus::Executed);
    assert_eq!(record.filled_qty(), 75);
    assert_eq!(record.avg_price(), Some(dec!(182.55)));
    assert_eq!(
        sink.stages(&CommandId::new("cmd-boot-1")),
        vec![TraceStage::Reconciled]
    );
    assert_eq!(broker.place_attempts(), 0);

    // Another cycle changes nothing.
    watcher.cycle().await;
    assert_eq!(broker.place_attempts(), 0);

    // The repository layer of the guard holds across the restart: the same
    // logical key under a fresh command id is refused without a broker call.
    let risk = Arc::new(RiskManagerService::new(Arc::clone(&broker)));
    risk.register_client(client(), RiskLimits::default());
    let commands = CommandService::new(
        Arc::clone(&repository),
        Arc::clone(&broker),
        Arc::new(PendingCommandSet::new()),
        risk,
        IntentTracker::new(Arc::clone(&sink)),
    );
    let outcome = commands
        .submit(sell_entry("cmd-boot-2", "NIFTY25MAR23400CE"))
        .await
        .unwrap();
    match outcome {
        SubmitOutcome::Duplicate { layer, .. } => assert_eq!(layer, GuardLayer::Repository),
        other => panic!("expected a repository-layer duplicate, got {other:?}"),
    }
    assert_eq!(broker.place_attempts(), 0);
}

#[tokio::test]
async fn unknown_broker_orders_are_reported_not_imported() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("oms.db").display());
    let pool = connect(&url).await.unwrap();

    let repository = Arc::new(SqliteOrderRepository::new(pool));
    let broker = Arc::new(PaperBroker::new());
    broker.seed_open_order(
        &client(),
        BrokerOrderId::new("240212009999"),
        Symbol::new("NIFTY25MAR22800PE"),
        Product::Nrml,
        Side::Sell,
    );

    let sink = Arc::new(InMemoryTraceSink::new());
    let watcher = restarted_watcher(
        Arc::clone(&repository),
        Arc::clone(&broker),
        Arc::clone(&sink),
    );
    watcher.cycle().await;
    watcher.cycle().await;

    // Reported once, never written to the repository, never acted on.
    assert_eq!(
        sink.stages(&CommandId::new("orphan:240212009999")),
        vec![TraceStage::Orphaned]
    );
    assert!(repository.find_active().await.unwrap().is_empty());
    assert!(
        repository
            .get_by_broker_id(&BrokerOrderId::new("240212009999"))
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(watcher.tracked_count(), 0);
    assert_eq!(broker.place_attempts(), 0);
}
