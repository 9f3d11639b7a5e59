//! Pipeline Integration Tests
//!
//! Cross-service scenarios over the paper broker and in-memory persistence,
//! wired the same way the composition root wires the real adapters:
//!
//! - duplicate intents stopped at each guard layer, one broker call total
//! - a stop-loss breach producing exactly one exit order
//! - requested exits bypassing the execution guard
//! - a rejected strangle leg leaving no live exposure behind
//! - a daily-loss breach vetoing one client without touching another

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use oms_engine::application::ports::{BrokerPort, TraceStage};
use oms_engine::application::services::{
    CommandService, ExitRequest, GuardLayer, IntentTracker, OrderWatcherService,
    PendingCommandSet, RiskManagerService, SubmitOutcome, WatcherConfig,
};
use oms_engine::domain::intent::{
    ExecutionType, IntentParams, IntentSource, OrderIntent, OrderKind, OrderRepository,
    OrderStatus, Side,
};
use oms_engine::domain::risk::{RiskBreach, RiskLimits};
use oms_engine::domain::shared::{ClientId, CommandId, Exchange, Product, Symbol};
use oms_engine::infrastructure::broker::PaperBroker;
use oms_engine::infrastructure::persistence::{InMemoryOrderRepository, InMemoryTraceSink};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// The full service stack over fakes, shared guard state included.
struct Pipeline {
    repository: Arc<InMemoryOrderRepository>,
    broker: Arc<PaperBroker>,
    sink: Arc<InMemoryTraceSink>,
    risk: Arc<RiskManagerService<PaperBroker>>,
    commands: CommandService<InMemoryOrderRepository, PaperBroker, InMemoryTraceSink>,
    watcher: OrderWatcherService<InMemoryOrderRepository, PaperBroker, InMemoryTraceSink>,
}

fn client() -> ClientId {
    ClientId::new("ZD0412")
}

fn other_client() -> ClientId {
    ClientId::new("ZB9001")
}

fn pipeline_with_limits(limits: RiskLimits) -> Pipeline {
    let repository = Arc::new(InMemoryOrderRepository::new());
    let broker = Arc::new(PaperBroker::new());
    let sink = Arc::new(InMemoryTraceSink::new());
    let pending = Arc::new(PendingCommandSet::new());

    let risk = Arc::new(RiskManagerService::new(Arc::clone(&broker)));
    risk.register_client(client(), limits);

    let commands = CommandService::new(
        Arc::clone(&repository),
        Arc::clone(&broker),
        Arc::clone(&pending),
        Arc::clone(&risk),
        IntentTracker::new(Arc::clone(&sink)),
    );
    let watcher = OrderWatcherService::new(
        client(),
        WatcherConfig::default(),
        Arc::clone(&repository),
        Arc::clone(&broker),
        IntentTracker::new(Arc::clone(&sink)),
        Arc::clone(&pending),
        risk.subscribe(),
    );

    Pipeline {
        repository,
        broker,
        sink,
        risk,
        commands,
        watcher,
    }
}

fn pipeline() -> Pipeline {
    pipeline_with_limits(RiskLimits::default())
}

fn entry_for(
    client_id: ClientId,
    command_id: &str,
    symbol: &str,
    side: Side,
    stop_loss: Option<Decimal>,
) -> OrderIntent {
    OrderIntent::new(IntentParams {
        command_id: CommandId::new(command_id),
        client_id,
        execution_type: ExecutionType::Entry,
        exchange: Exchange::Nfo,
        symbol: Symbol::new(symbol),
        side,
        quantity: 75,
        order_kind: OrderKind::Market,
        price: None,
        trigger_price: None,
        stop_loss,
        target: None,
        product: Product::Nrml,
        source: IntentSource::Strategy,
    })
    .expect("entry intent should validate")
}

fn entry(command_id: &str, symbol: &str, side: Side, stop_loss: Option<Decimal>) -> OrderIntent {
    entry_for(client(), command_id, symbol, side, stop_loss)
}

#[tokio::test]
async fn duplicate_submission_is_blocked_at_each_layer() {
    let f = pipeline();
    let symbol = "NIFTY25MAR23400CE";
    f.broker.set_last_price(&Symbol::new(symbol), dec!(182.55));

    let outcome = f
        .commands
        .submit(entry("cmd-dup-a", symbol, Side::Sell, None))
        .await
        .unwrap();
    assert!(outcome.is_accepted());
    assert_eq!(f.broker.place_attempts(), 1);

    // Same logical key, fresh command id. The in-flight claim from the first
    // submission is still held because nothing has reconciled yet.
    let outcome = f
        .commands
        .submit(entry("cmd-dup-b", symbol, Side::Sell, None))
        .await
        .unwrap();
    match outcome {
        SubmitOutcome::Duplicate { layer, .. } => assert_eq!(layer, GuardLayer::Memory),
        other => panic!("expected a memory-layer duplicate, got {other:?}"),
    }

    // Reconciliation confirms the fill and releases the claim; from here the
    // repository layer holds the line.
    f.watcher.cycle().await;
    let record = f
        .repository
        .get_by_command_id(&CommandId::new("cmd-dup-a"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status(), OrderStatus::Executed);

    let outcome = f
        .commands
        .submit(entry("cmd-dup-c", symbol, Side::Sell, None))
        .await
        .unwrap();
    match outcome {
        SubmitOutcome::Duplicate { layer, .. } => assert_eq!(layer, GuardLayer::Repository),
        other => panic!("expected a repository-layer duplicate, got {other:?}"),
    }

    // Three submissions, one broker order.
    assert_eq!(f.broker.place_attempts(), 1);
}

#[tokio::test]
async fn stop_loss_fires_exactly_one_exit() {
    let f = pipeline();
    let symbol = Symbol::new("NIFTY25MAR23400CE");
    f.broker.set_last_price(&symbol, dec!(120));

    let outcome = f
        .commands
        .submit(entry(
            "cmd-sl-entry",
            "NIFTY25MAR23400CE",
            Side::Buy,
            Some(dec!(110)),
        ))
        .await
        .unwrap();
    assert!(outcome.is_accepted());
    assert_eq!(f.broker.place_attempts(), 1);

    // Cycle one reconciles the fill, cycle two adopts the open position.
    // Price is above the stop, so nothing triggers.
    f.watcher.cycle().await;
    f.watcher.cycle().await;
    assert_eq!(f.watcher.tracked_count(), 1);
    assert_eq!(f.broker.place_attempts(), 1);

    f.broker.set_last_price(&symbol, dec!(100));
    f.watcher.cycle().await;
    assert_eq!(f.broker.place_attempts(), 2);

    // Once the exit filled the position is flat; further cycles must not
    // fire again, and the tracked entry is dropped.
    f.watcher.cycle().await;
    f.watcher.cycle().await;
    assert_eq!(f.broker.place_attempts(), 2);
    assert_eq!(f.watcher.tracked_count(), 0);

    let positions = f.broker.positions(&client()).await.unwrap();
    assert!(positions.iter().all(|p| p.net_qty == 0));

    let executed = f
        .repository
        .find_by_status(OrderStatus::Executed)
        .await
        .unwrap();
    let exits: Vec<_> = executed
        .iter()
        .filter(|r| r.intent().execution_type() == ExecutionType::Exit)
        .collect();
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].intent().side(), Side::Sell);
    assert_eq!(exits[0].intent().quantity(), 75);
    assert_eq!(exits[0].intent().source(), IntentSource::Watcher);
}

#[tokio::test]
async fn requested_exit_bypasses_the_guard() {
    let f = pipeline();
    let symbol = Symbol::new("NIFTY25MAR22800PE");
    f.broker.set_last_price(&symbol, dec!(96.40));

    // Short put with a far-away stop, so the watcher adopts it but never
    // triggers on its own.
    let outcome = f
        .commands
        .submit(entry(
            "cmd-req-entry",
            "NIFTY25MAR22800PE",
            Side::Sell,
            Some(dec!(200)),
        ))
        .await
        .unwrap();
    assert!(outcome.is_accepted());

    f.watcher.cycle().await;
    f.watcher.cycle().await;
    assert_eq!(f.watcher.tracked_count(), 1);

    // A same-key submission through the command service would be blocked by
    // the live entry record. The watcher's own exits never see the guard.
    f.watcher.request_exit(ExitRequest {
        client_id: client(),
        exchange: Exchange::Nfo,
        symbol: symbol.clone(),
        product: Product::Nrml,
        reason: "manual square-off".to_string(),
    });
    f.watcher.cycle().await;
    assert_eq!(f.broker.place_attempts(), 2);

    let sent = f
        .repository
        .find_by_status(OrderStatus::SentToBroker)
        .await
        .unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].intent().execution_type(), ExecutionType::Exit);
    assert_eq!(sent[0].intent().side(), Side::Buy);
    assert_eq!(sent[0].intent().source(), IntentSource::Watcher);

    // Let the exit reconcile, then ask again on a flat book: a logged no-op.
    f.watcher.cycle().await;
    f.watcher.request_exit(ExitRequest {
        client_id: client(),
        exchange: Exchange::Nfo,
        symbol,
        product: Product::Nrml,
        reason: "manual square-off".to_string(),
    });
    f.watcher.cycle().await;
    assert_eq!(f.broker.place_attempts(), 2);
}

#[tokio::test]
async fn failed_leg_leaves_no_live_records() {
    let f = pipeline();
    let ce = Symbol::new("NIFTY25MAR23400CE");
    let pe = Symbol::new("NIFTY25MAR22800PE");
    f.broker.set_last_price(&ce, dec!(182.55));
    f.broker.set_last_price(&pe, dec!(96.40));

    let outcome = f
        .commands
        .submit(entry("cmd-leg-ce", "NIFTY25MAR23400CE", Side::Sell, None))
        .await
        .unwrap();
    assert!(outcome.is_accepted());

    // The second leg hits a margin rejection at the broker.
    f.broker.reject_symbol(&pe, "margin exceeded");
    let outcome = f
        .commands
        .submit(entry("cmd-leg-pe", "NIFTY25MAR22800PE", Side::Sell, None))
        .await
        .unwrap();
    let record = match outcome {
        SubmitOutcome::Failed(record) => record,
        other => panic!("expected the rejected leg to fail, got {other:?}"),
    };
    assert_eq!(record.status(), OrderStatus::Failed);
    assert!(
        record
            .failure_reason()
            .unwrap_or_default()
            .contains("margin exceeded")
    );

    // The failed record is audit trail, not live exposure.
    let live = f
        .repository
        .find_live_by_logical_key(&record.intent().logical_key())
        .await
        .unwrap();
    assert!(live.is_empty());
    assert_eq!(
        f.sink.stages(&CommandId::new("cmd-leg-pe")),
        vec![TraceStage::Created, TraceStage::Persisted, TraceStage::Failed]
    );

    // Retrying the leg under a fresh command id goes straight through.
    let outcome = f
        .commands
        .submit(entry("cmd-leg-pe2", "NIFTY25MAR22800PE", Side::Sell, None))
        .await
        .unwrap();
    assert!(outcome.is_accepted());
    assert_eq!(f.broker.place_attempts(), 3);
}

#[tokio::test]
async fn risk_breach_vetoes_and_isolates_clients() {
    let f = pipeline_with_limits(RiskLimits {
        daily_loss_limit: dec!(3000),
        ..RiskLimits::default()
    });
    f.risk.register_client(other_client(), RiskLimits::default());

    let ce = Symbol::new("NIFTY25MAR23400CE");
    let pe = Symbol::new("NIFTY25MAR22800PE");
    f.broker.set_last_price(&ce, dec!(182.55));
    f.broker.set_last_price(&pe, dec!(96.40));

    // A short leg for the first client, deep under water per the broker.
    f.broker
        .seed_position(&client(), ce.clone(), Exchange::Nfo, Product::Nrml, -75);
    f.broker
        .set_position_pnl(&client(), &ce, dec!(-3500), Decimal::ZERO);
    f.risk.heartbeat().await;

    let outcome = f
        .commands
        .submit(entry("cmd-risk-a", "NIFTY25MAR23400CE", Side::Sell, None))
        .await
        .unwrap();
    match outcome {
        SubmitOutcome::RiskVetoed { breaches } => {
            assert!(
                breaches
                    .iter()
                    .any(|b| matches!(b, RiskBreach::DailyLossBreached { .. }))
            );
        }
        other => panic!("expected a risk veto, got {other:?}"),
    }
    assert_eq!(f.broker.place_attempts(), 0);

    // The healthy client is untouched by the neighbour's breach.
    let outcome = f
        .commands
        .submit(entry_for(
            other_client(),
            "cmd-risk-b",
            "NIFTY25MAR22800PE",
            Side::Sell,
            None,
        ))
        .await
        .unwrap();
    assert!(outcome.is_accepted());
    assert_eq!(f.broker.place_attempts(), 1);

    // The watcher drains the forced-exit broadcast and flattens the
    // breaching client's book, nobody else's.
    f.watcher.cycle().await;
    assert_eq!(f.broker.place_attempts(), 2);

    let sent = f
        .repository
        .find_by_status(OrderStatus::SentToBroker)
        .await
        .unwrap();
    let forced: Vec<_> = sent
        .iter()
        .filter(|r| r.intent().source() == IntentSource::RiskManager)
        .collect();
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0].intent().client_id(), &client());
    assert_eq!(forced[0].intent().side(), Side::Buy);
    assert_eq!(forced[0].intent().execution_type(), ExecutionType::Exit);
}
