//! Order Watcher Engine
//!
//! The only component that sends EXIT orders to the broker, and the
//! reconciliation authority for everything already sent. Each cycle adopts
//! executed entries into tracking, evaluates exit rules against live
//! prices, serves forced and requested exits, reconciles the repository
//! against the broker books, and closes positions the broker reports flat.
//!
//! Broker state always wins: positions close only on broker-reported zero
//! quantity, records move only on broker-reported order status, and
//! positions the engine cannot account for are reported, never adopted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveTime};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::ports::{
    BrokerOrder, BrokerOrderStatus, BrokerPort, BrokerPosition, PlaceOrderParams, TraceSinkPort,
    TraceStage,
};
use crate::application::services::pending::PendingCommandSet;
use crate::application::services::risk_manager::ForcedExit;
use crate::application::services::tracker::IntentTracker;
use crate::domain::exits::{
    ExitEvaluator, ExitLevels, ExitTrigger, PositionDirection, PositionPhase, TrackKey,
    TrackedPosition, TrailingMode,
};
use crate::domain::intent::{
    ExecutionType, IntentParams, IntentSource, LogicalKey, OrderIntent, OrderKind, OrderRecord,
    OrderRepository, OrderStatus, Side, StatusUpdate,
};
use crate::domain::shared::{ClientId, CommandId, Exchange, Product, Symbol, Timestamp};

/// Watcher tuning.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Cycle interval.
    pub poll_interval: Duration,
    /// Age past which a non-terminal record is flagged to the operator.
    pub stale_after: ChronoDuration,
    /// Trailing rule applied to adopted positions.
    pub trailing: TrailingMode,
    /// Maximum holding time applied to adopted positions.
    pub max_hold: Option<ChronoDuration>,
    /// Daily square-off cutoff (UTC wall clock).
    pub square_off: Option<NaiveTime>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            stale_after: ChronoDuration::seconds(90),
            trailing: TrailingMode::Off,
            max_hold: None,
            square_off: None,
        }
    }
}

/// Exit requested by a collaborator (strategy engine or operator surface).
#[derive(Debug, Clone)]
pub struct ExitRequest {
    /// Client holding the position.
    pub client_id: ClientId,
    /// Exchange segment.
    pub exchange: Exchange,
    /// Instrument to flatten.
    pub symbol: Symbol,
    /// Product bucket.
    pub product: Product,
    /// Why the exit was requested.
    pub reason: String,
}

/// Exit and reconciliation engine for one client.
pub struct OrderWatcherService<O, B, T: TraceSinkPort> {
    client_id: ClientId,
    config: WatcherConfig,
    repository: Arc<O>,
    broker: Arc<B>,
    tracker: IntentTracker<T>,
    pending: Arc<PendingCommandSet>,
    evaluator: ExitEvaluator,
    tracked: RwLock<HashMap<TrackKey, TrackedPosition>>,
    forced_exits: Mutex<broadcast::Receiver<ForcedExit>>,
    exit_requests: Mutex<VecDeque<ExitRequest>>,
    stale_flagged: Mutex<HashSet<String>>,
    orphan_flagged: Mutex<HashSet<String>>,
}

impl<O, B, T> OrderWatcherService<O, B, T>
where
    O: OrderRepository,
    B: BrokerPort,
    T: TraceSinkPort,
{
    /// Wire a watcher for `client_id`.
    #[must_use]
    pub fn new(
        client_id: ClientId,
        config: WatcherConfig,
        repository: Arc<O>,
        broker: Arc<B>,
        tracker: IntentTracker<T>,
        pending: Arc<PendingCommandSet>,
        forced_exits: broadcast::Receiver<ForcedExit>,
    ) -> Self {
        Self {
            client_id,
            config,
            repository,
            broker,
            tracker,
            pending,
            evaluator: ExitEvaluator::new(),
            tracked: RwLock::new(HashMap::new()),
            forced_exits: Mutex::new(forced_exits),
            exit_requests: Mutex::new(VecDeque::new()),
            stale_flagged: Mutex::new(HashSet::new()),
            orphan_flagged: Mutex::new(HashSet::new()),
        }
    }

    /// Queue an exit for the next cycle.
    pub fn request_exit(&self, request: ExitRequest) {
        self.exit_requests.lock().push_back(request);
    }

    /// Count of positions currently tracked.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.read().len()
    }

    /// Phase of a tracked position, if tracked.
    #[must_use]
    pub fn tracked_phase(&self, key: &TrackKey) -> Option<PositionPhase> {
        self.tracked.read().get(key).map(TrackedPosition::phase)
    }

    /// One full watch cycle. Runs to completion against a single snapshot
    /// of the broker books; concurrent submissions are seen next cycle.
    pub async fn cycle(&self) {
        let now = Timestamp::now();

        let positions = match self.broker.positions(&self.client_id).await {
            Ok(positions) => positions,
            Err(err) => {
                warn!(error = %err, "position book unavailable, cycle skipped");
                return;
            }
        };
        let orders = match self.broker.order_book(&self.client_id).await {
            Ok(orders) => orders,
            Err(err) => {
                warn!(error = %err, "order book unavailable, cycle skipped");
                return;
            }
        };

        self.adopt(&positions).await;
        self.evaluate(now).await;
        self.serve_forced_exits(&positions).await;
        self.serve_exit_requests(&positions).await;
        self.reconcile(&orders, now).await;
        self.close_flat(&positions);
    }

    /// Drive cycles until cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cycle().await;
                }
                () = shutdown.cancelled() => {
                    info!("Order watcher shutting down");
                    break;
                }
            }
        }
    }

    /// Bring executed entries with exit levels under watch, provided the
    /// broker actually shows the position.
    async fn adopt(&self, positions: &[BrokerPosition]) {
        let records = match self.repository.find_watchable_entries(&self.client_id).await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "watchable entry query failed");
                return;
            }
        };

        for record in &records {
            let intent = record.intent();
            let key = TrackKey {
                client_id: self.client_id.clone(),
                exchange: intent.exchange(),
                symbol: intent.symbol().clone(),
                product: intent.product(),
            };
            if self.tracked.read().contains_key(&key) {
                continue;
            }

            let Some(position) = positions
                .iter()
                .find(|p| p.symbol == key.symbol && p.product == key.product && p.is_open())
            else {
                continue;
            };
            let Some(direction) = PositionDirection::from_net_qty(position.net_qty) else {
                continue;
            };

            let entry_price = record
                .avg_price()
                .or_else(|| intent.price())
                .unwrap_or(Decimal::ZERO);
            let levels = ExitLevels {
                direction,
                entry_price,
                stop_loss: intent.stop_loss(),
                target: intent.target(),
                trailing: self.config.trailing,
                max_hold: self.config.max_hold,
                square_off: self.config.square_off,
            };
            let quantity = position.net_qty.unsigned_abs().try_into().unwrap_or(u32::MAX);
            let tracked = TrackedPosition::new(
                key.clone(),
                intent.command_id().clone(),
                quantity,
                levels,
                record.updated_at(),
            );
            info!(%key, %direction, quantity, "position adopted for watching");
            self.tracked.write().insert(key, tracked);
        }

        // Broker positions the repository cannot explain are operator
        // problems, not adoption candidates.
        for position in positions.iter().filter(|p| p.is_open()) {
            let watched = self.tracked.read().keys().any(|k| {
                k.symbol == position.symbol && k.product == position.product
            });
            if !watched && !self.position_explained(position).await {
                self.report_orphan_position(position).await;
            }
        }
    }

    /// A position is explained when a non-failed ENTRY or ADJUST record
    /// exists for its symbol and product.
    async fn position_explained(&self, position: &BrokerPosition) -> bool {
        for execution_type in [ExecutionType::Entry, ExecutionType::Adjust] {
            let key = LogicalKey {
                client_id: self.client_id.clone(),
                exchange: position.exchange,
                symbol: position.symbol.clone(),
                product: position.product,
                execution_type,
            };
            match self.repository.find_live_by_logical_key(&key).await {
                Ok(records) if !records.is_empty() => return true,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "logical key lookup failed, orphan check skipped");
                    return true;
                }
            }
        }
        false
    }

    /// Evaluate exit rules for live tracked positions. At most one exit
    /// order per position per breach.
    async fn evaluate(&self, now: Timestamp) {
        let live_keys: Vec<TrackKey> = self
            .tracked
            .read()
            .iter()
            .filter(|(_, p)| p.is_live())
            .map(|(k, _)| k.clone())
            .collect();

        for key in live_keys {
            let last_price = match self.broker.last_traded_price(key.exchange, &key.symbol).await {
                Ok(price) => price,
                Err(err) => {
                    warn!(%key, error = %err, "no price, evaluation skipped");
                    continue;
                }
            };

            let fired = {
                let mut tracked = self.tracked.write();
                let Some(position) = tracked.get_mut(&key) else {
                    continue;
                };
                match self.evaluator.evaluate(position, last_price, now) {
                    None => None,
                    Some(trigger) => {
                        position.mark_exit_triggered(trigger.clone());
                        Some((trigger, position.levels().direction, position.quantity()))
                    }
                }
            };

            if let Some((trigger, direction, quantity)) = fired {
                let side = match direction {
                    PositionDirection::Long => Side::Sell,
                    PositionDirection::Short => Side::Buy,
                };
                info!(%key, %trigger, %last_price, "exit triggered");
                self.dispatch_exit(&key, side, quantity, IntentSource::Watcher, &trigger.to_string())
                    .await;
            }
        }
    }

    /// Drain risk broadcasts; flatten everything for this client.
    async fn serve_forced_exits(&self, positions: &[BrokerPosition]) {
        loop {
            let message = self.forced_exits.lock().try_recv();
            match message {
                Ok(forced) => {
                    if forced.client_id != self.client_id {
                        continue;
                    }
                    error!(reason = %forced.reason, "forced exit: flattening all positions");
                    self.flatten_all(positions, IntentSource::RiskManager, &forced.reason)
                        .await;
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "forced exit receiver lagged");
                }
                Err(_) => break,
            }
        }
    }

    /// Serve queued exit requests from the strategy engine.
    async fn serve_exit_requests(&self, positions: &[BrokerPosition]) {
        let requests: Vec<ExitRequest> = self.exit_requests.lock().drain(..).collect();
        for request in requests {
            if request.client_id != self.client_id {
                warn!(client_id = %request.client_id, "exit request for foreign client dropped");
                continue;
            }
            let Some(position) = positions.iter().find(|p| {
                p.symbol == request.symbol && p.product == request.product && p.is_open()
            }) else {
                info!(symbol = %request.symbol, "exit requested for flat position, nothing to do");
                continue;
            };
            let Some(side) = Side::flattening(position.net_qty) else {
                continue;
            };
            let key = TrackKey {
                client_id: self.client_id.clone(),
                exchange: position.exchange,
                symbol: position.symbol.clone(),
                product: position.product,
            };
            self.mark_triggered(&key, ExitTrigger::StrategyExit {
                reason: request.reason.clone(),
            });
            let quantity = position.net_qty.unsigned_abs().try_into().unwrap_or(u32::MAX);
            info!(%key, reason = %request.reason, "requested exit");
            self.dispatch_exit(&key, side, quantity, IntentSource::Watcher, &request.reason)
                .await;
        }
    }

    /// Repository vs broker order book, broker wins.
    async fn reconcile(&self, orders: &[BrokerOrder], now: Timestamp) {
        let active = match self.repository.find_active().await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "active record query failed");
                return;
            }
        };

        for record in &active {
            match record.status() {
                OrderStatus::Created => {
                    // A record stuck before the send means the process died
                    // mid-submission; only an operator can resolve it.
                    if record.updated_at().age(now) > self.config.stale_after {
                        self.flag_stale(record, now).await;
                    }
                }
                OrderStatus::SentToBroker => {
                    let Some(broker_order_id) = record.broker_order_id() else {
                        continue;
                    };
                    match orders.iter().find(|o| o.broker_order_id == *broker_order_id) {
                        Some(order) => self.reconcile_record(record, order).await,
                        None => {
                            if record.updated_at().age(now) > self.config.stale_after {
                                self.flag_stale(record, now).await;
                            }
                        }
                    }
                }
                OrderStatus::Executed | OrderStatus::Failed => {}
            }
        }

        for order in orders {
            match self.repository.get_by_broker_id(&order.broker_order_id).await {
                Ok(Some(_)) => {}
                Ok(None) => self.report_orphan_order(order).await,
                Err(err) => warn!(error = %err, "broker id lookup failed"),
            }
        }
    }

    async fn reconcile_record(&self, record: &OrderRecord, order: &BrokerOrder) {
        let command_id = record.intent().command_id().clone();
        let update = match order.status {
            BrokerOrderStatus::Open => return,
            BrokerOrderStatus::Complete => StatusUpdate::executed(
                order.filled_qty,
                order.avg_price.unwrap_or(Decimal::ZERO),
            ),
            BrokerOrderStatus::Cancelled => StatusUpdate::failed("broker status CANCELLED"),
            BrokerOrderStatus::Rejected => StatusUpdate::failed("broker status REJECTED"),
        };
        let became = update.status;

        match self.repository.update_status(&command_id, update).await {
            Ok(updated) => {
                self.pending.release(&updated.intent().logical_key());
                let stage = if became == OrderStatus::Executed {
                    TraceStage::Reconciled
                } else {
                    TraceStage::Failed
                };
                self.tracker
                    .record(
                        &command_id,
                        stage,
                        Some(format!("broker reported {:?}", order.status)),
                    )
                    .await;
                info!(%command_id, status = %updated.status(), "record reconciled from broker");
            }
            Err(err) => {
                warn!(%command_id, error = %err, "reconcile update failed");
            }
        }
    }

    /// Feed broker net quantities into tracked phases; drop closed ones.
    fn close_flat(&self, positions: &[BrokerPosition]) {
        let mut tracked = self.tracked.write();
        tracked.retain(|key, position| {
            let net_qty = positions
                .iter()
                .find(|p| p.symbol == key.symbol && p.product == key.product)
                .map_or(0, |p| p.net_qty);
            position.observe_net_qty(net_qty);
            if position.phase() == PositionPhase::Closed {
                info!(%key, "position closed by broker");
                false
            } else {
                true
            }
        });
    }

    async fn flatten_all(&self, positions: &[BrokerPosition], source: IntentSource, reason: &str) {
        for position in positions.iter().filter(|p| p.is_open()) {
            let Some(side) = Side::flattening(position.net_qty) else {
                continue;
            };
            let key = TrackKey {
                client_id: self.client_id.clone(),
                exchange: position.exchange,
                symbol: position.symbol.clone(),
                product: position.product,
            };
            self.mark_triggered(&key, ExitTrigger::RiskBreach {
                reason: reason.to_string(),
            });
            let quantity = position.net_qty.unsigned_abs().try_into().unwrap_or(u32::MAX);
            self.dispatch_exit(&key, side, quantity, source, reason).await;
        }
    }

    fn mark_triggered(&self, key: &TrackKey, trigger: ExitTrigger) {
        if let Some(position) = self.tracked.write().get_mut(key) {
            position.mark_exit_triggered(trigger);
        }
    }

    /// Build, persist and send one exit order. Failures are recorded and
    /// surfaced; they are never retried from here.
    async fn dispatch_exit(
        &self,
        key: &TrackKey,
        side: Side,
        quantity: u32,
        source: IntentSource,
        reason: &str,
    ) {
        let intent = match OrderIntent::new(IntentParams {
            command_id: CommandId::generate(),
            client_id: key.client_id.clone(),
            execution_type: ExecutionType::Exit,
            exchange: key.exchange,
            symbol: key.symbol.clone(),
            side,
            quantity,
            order_kind: OrderKind::Market,
            price: None,
            trigger_price: None,
            stop_loss: None,
            target: None,
            product: key.product,
            source,
        }) {
            Ok(intent) => intent,
            Err(err) => {
                error!(%key, error = %err, "exit intent rejected by validation");
                return;
            }
        };
        let command_id = intent.command_id().clone();

        if let Err(err) = self.repository.create(&intent).await {
            error!(%command_id, error = %err, "exit record not persisted, order not sent");
            return;
        }
        self.tracker.record(&command_id, TraceStage::Created, None).await;
        self.tracker
            .record(&command_id, TraceStage::Persisted, None)
            .await;

        match self.broker.place_order(PlaceOrderParams::from_intent(&intent)).await {
            Ok(broker_order_id) => {
                if let Err(err) = self
                    .repository
                    .update_status(&command_id, StatusUpdate::sent(broker_order_id.clone()))
                    .await
                {
                    warn!(%command_id, error = %err, "sent status not recorded");
                }
                self.tracker
                    .record(
                        &command_id,
                        TraceStage::SentToBroker,
                        Some(format!("{reason}; broker_order_id={broker_order_id}")),
                    )
                    .await;
                info!(%command_id, %broker_order_id, %reason, "exit order sent");
            }
            Err(err) => {
                let failure = format!("exit send failed: {err}");
                if let Err(update_err) = self
                    .repository
                    .update_status(&command_id, StatusUpdate::failed(failure.clone()))
                    .await
                {
                    warn!(%command_id, error = %update_err, "failed status not recorded");
                }
                self.tracker
                    .record(&command_id, TraceStage::Failed, Some(failure))
                    .await;
                error!(%command_id, %key, error = %err, "exit order failed, operator attention required");
            }
        }
    }

    async fn flag_stale(&self, record: &OrderRecord, now: Timestamp) {
        let command_id = record.intent().command_id();
        if !self.stale_flagged.lock().insert(command_id.as_str().to_string()) {
            return;
        }
        let age_secs = record.updated_at().age(now).num_seconds();
        error!(
            %command_id,
            status = %record.status(),
            age_secs,
            "record stale, operator attention required"
        );
        self.tracker
            .record(
                command_id,
                TraceStage::Stale,
                Some(format!("stuck in {} for {age_secs}s", record.status())),
            )
            .await;
    }

    async fn report_orphan_order(&self, order: &BrokerOrder) {
        let flag = format!("order:{}", order.broker_order_id);
        if !self.orphan_flagged.lock().insert(flag) {
            return;
        }
        warn!(
            broker_order_id = %order.broker_order_id,
            symbol = %order.symbol,
            "broker order unknown to the repository, reported and left alone"
        );
        self.tracker
            .record(
                &CommandId::new(format!("orphan:{}", order.broker_order_id)),
                TraceStage::Orphaned,
                Some(format!("broker order on {}/{}", order.symbol, order.product)),
            )
            .await;
    }

    async fn report_orphan_position(&self, position: &BrokerPosition) {
        let flag = format!("position:{}/{}", position.symbol, position.product);
        if !self.orphan_flagged.lock().insert(flag) {
            return;
        }
        warn!(
            symbol = %position.symbol,
            net_qty = position.net_qty,
            "broker position has no originating record, reported and left alone"
        );
        self.tracker
            .record(
                &CommandId::new(format!("orphan:{}:{}", position.symbol, position.product)),
                TraceStage::Orphaned,
                Some(format!("net_qty {}", position.net_qty)),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::BrokerOrderId;
    use crate::infrastructure::broker::PaperBroker;
    use crate::infrastructure::persistence::{InMemoryOrderRepository, InMemoryTraceSink};
    use rust_decimal_macros::dec;

    struct Fixture {
        watcher: OrderWatcherService<InMemoryOrderRepository, PaperBroker, InMemoryTraceSink>,
        repository: Arc<InMemoryOrderRepository>,
        broker: Arc<PaperBroker>,
        pending: Arc<PendingCommandSet>,
        sink: Arc<InMemoryTraceSink>,
        forced_tx: broadcast::Sender<ForcedExit>,
    }

    fn fixture_with(config: WatcherConfig) -> Fixture {
        let repository = Arc::new(InMemoryOrderRepository::new());
        let broker = Arc::new(PaperBroker::new());
        let pending = Arc::new(PendingCommandSet::new());
        let sink = Arc::new(InMemoryTraceSink::new());
        let (forced_tx, forced_rx) = broadcast::channel(16);
        let watcher = OrderWatcherService::new(
            ClientId::new("ZD0412"),
            config,
            Arc::clone(&repository),
            Arc::clone(&broker),
            IntentTracker::new(Arc::clone(&sink)),
            Arc::clone(&pending),
            forced_rx,
        );
        Fixture {
            watcher,
            repository,
            broker,
            pending,
            sink,
            forced_tx,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(WatcherConfig::default())
    }

    fn ce_symbol() -> Symbol {
        Symbol::new("NIFTY25MAR23400CE")
    }

    fn ce_key() -> TrackKey {
        TrackKey {
            client_id: ClientId::new("ZD0412"),
            exchange: Exchange::Nfo,
            symbol: ce_symbol(),
            product: Product::Nrml,
        }
    }

    fn short_entry(command_id: &str, stop_loss: Option<Decimal>, target: Option<Decimal>) -> OrderIntent {
        OrderIntent::new(IntentParams {
            command_id: CommandId::new(command_id),
            client_id: ClientId::new("ZD0412"),
            execution_type: ExecutionType::Entry,
            exchange: Exchange::Nfo,
            symbol: ce_symbol(),
            side: Side::Sell,
            quantity: 75,
            order_kind: OrderKind::Market,
            price: None,
            trigger_price: None,
            stop_loss,
            target,
            product: Product::Nrml,
            source: IntentSource::Strategy,
        })
        .unwrap()
    }

    /// Drive a record through the pipeline states an executed entry has.
    async fn executed_short_entry(f: &Fixture, command_id: &str) {
        let intent = short_entry(command_id, Some(dec!(180)), Some(dec!(60)));
        f.repository.create(&intent).await.unwrap();
        f.repository
            .update_status(
                &CommandId::new(command_id),
                StatusUpdate::sent(BrokerOrderId::new("240212000001")),
            )
            .await
            .unwrap();
        f.repository
            .update_status(&CommandId::new(command_id), StatusUpdate::executed(75, dec!(120)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn adopts_executed_entry_with_broker_position() {
        let f = fixture();
        executed_short_entry(&f, "cmd-1").await;
        f.broker
            .seed_position(&ClientId::new("ZD0412"), ce_symbol(), Exchange::Nfo, Product::Nrml, -75);
        f.broker.set_last_price(&ce_symbol(), dec!(120));

        f.watcher.cycle().await;

        assert_eq!(f.watcher.tracked_count(), 1);
        assert_eq!(f.watcher.tracked_phase(&ce_key()), Some(PositionPhase::Live));
    }

    #[tokio::test]
    async fn executed_entry_without_position_is_not_adopted() {
        let f = fixture();
        executed_short_entry(&f, "cmd-1").await;

        f.watcher.cycle().await;

        assert_eq!(f.watcher.tracked_count(), 0);
    }

    #[tokio::test]
    async fn orphan_position_reported_never_adopted() {
        let f = fixture();
        f.broker
            .seed_position(&ClientId::new("ZD0412"), ce_symbol(), Exchange::Nfo, Product::Nrml, -75);
        f.broker.set_last_price(&ce_symbol(), dec!(120));

        f.watcher.cycle().await;
        f.watcher.cycle().await;

        assert_eq!(f.watcher.tracked_count(), 0);
        // Reported once, not once per cycle.
        let stages = f.sink.stages(&CommandId::new("orphan:NIFTY25MAR23400CE:NRML"));
        assert_eq!(stages, vec![TraceStage::Orphaned]);
        // And no exit was sent against it.
        assert_eq!(f.broker.place_attempts(), 0);
    }

    #[tokio::test]
    async fn stop_breach_sends_exactly_one_exit_then_closes_on_flat() {
        let f = fixture();
        executed_short_entry(&f, "cmd-1").await;
        f.broker
            .seed_position(&ClientId::new("ZD0412"), ce_symbol(), Exchange::Nfo, Product::Nrml, -75);
        f.broker.set_last_price(&ce_symbol(), dec!(120));

        // Cycle 1: safe price, adopted and left alone.
        f.watcher.cycle().await;
        assert_eq!(f.broker.place_attempts(), 0);

        // Cycle 2: stop at 180 breached. One market exit goes out and the
        // paper broker fills it, flattening the position.
        f.broker.set_last_price(&ce_symbol(), dec!(185));
        f.watcher.cycle().await;
        assert_eq!(f.broker.place_attempts(), 1);
        assert_eq!(f.watcher.tracked_phase(&ce_key()), Some(PositionPhase::ExitTriggered));

        let sent = f.repository.find_by_status(OrderStatus::SentToBroker).await.unwrap();
        assert_eq!(sent.len(), 1);
        let exit = &sent[0];
        assert_eq!(exit.intent().execution_type(), ExecutionType::Exit);
        assert_eq!(exit.intent().side(), Side::Buy);
        assert_eq!(exit.intent().quantity(), 75);
        assert_eq!(exit.intent().source(), IntentSource::Watcher);

        // Cycle 3: price keeps running but the breach already fired; the
        // flat position is closed out and the exit record reconciled.
        f.broker.set_last_price(&ce_symbol(), dec!(200));
        f.watcher.cycle().await;
        assert_eq!(f.broker.place_attempts(), 1);
        assert_eq!(f.watcher.tracked_count(), 0);

        let exit_id = exit.intent().command_id().clone();
        let reconciled = f.repository.get_by_command_id(&exit_id).await.unwrap().unwrap();
        assert_eq!(reconciled.status(), OrderStatus::Executed);
        assert!(f.sink.stages(&exit_id).contains(&TraceStage::Reconciled));
    }

    #[tokio::test]
    async fn forced_exit_flattens_all_positions() {
        let f = fixture();
        let client = ClientId::new("ZD0412");
        f.broker
            .seed_position(&client, ce_symbol(), Exchange::Nfo, Product::Nrml, -75);
        f.broker.seed_position(
            &client,
            Symbol::new("NIFTY25MAR22800PE"),
            Exchange::Nfo,
            Product::Nrml,
            -75,
        );
        f.broker.set_last_price(&ce_symbol(), dec!(120));
        f.broker.set_last_price(&Symbol::new("NIFTY25MAR22800PE"), dec!(95));

        f.forced_tx
            .send(ForcedExit {
                client_id: client,
                reason: "daily loss limit breached".to_string(),
            })
            .unwrap();

        f.watcher.cycle().await;

        assert_eq!(f.broker.place_attempts(), 2);
        let sent = f.repository.find_by_status(OrderStatus::SentToBroker).await.unwrap();
        assert_eq!(sent.len(), 2);
        for record in &sent {
            assert_eq!(record.intent().execution_type(), ExecutionType::Exit);
            assert_eq!(record.intent().side(), Side::Buy);
            assert_eq!(record.intent().source(), IntentSource::RiskManager);
        }
    }

    #[tokio::test]
    async fn requested_exit_flattens_broker_quantity() {
        let f = fixture();
        f.broker
            .seed_position(&ClientId::new("ZD0412"), ce_symbol(), Exchange::Nfo, Product::Nrml, -150);
        f.broker.set_last_price(&ce_symbol(), dec!(120));

        f.watcher.request_exit(ExitRequest {
            client_id: ClientId::new("ZD0412"),
            exchange: Exchange::Nfo,
            symbol: ce_symbol(),
            product: Product::Nrml,
            reason: "profit step reached".to_string(),
        });
        f.watcher.cycle().await;

        assert_eq!(f.broker.place_attempts(), 1);
        let sent = f.repository.find_by_status(OrderStatus::SentToBroker).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].intent().quantity(), 150);
        assert_eq!(sent[0].intent().side(), Side::Buy);
    }

    #[tokio::test]
    async fn reconcile_completes_sent_record_and_releases_key() {
        let f = fixture();
        let intent = short_entry("cmd-1", None, None);
        assert!(f.pending.try_claim(intent.logical_key()));
        f.repository.create(&intent).await.unwrap();
        f.repository
            .update_status(
                &CommandId::new("cmd-1"),
                StatusUpdate::sent(BrokerOrderId::new("240212000111")),
            )
            .await
            .unwrap();

        f.broker.seed_open_order(
            &ClientId::new("ZD0412"),
            BrokerOrderId::new("240212000111"),
            ce_symbol(),
            Product::Nrml,
            Side::Sell,
        );
        f.broker.complete_order(&BrokerOrderId::new("240212000111"), 75, dec!(118.5));

        f.watcher.cycle().await;

        let record = f
            .repository
            .get_by_command_id(&CommandId::new("cmd-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), OrderStatus::Executed);
        assert_eq!(record.filled_qty(), 75);
        assert_eq!(record.avg_price(), Some(dec!(118.5)));
        assert!(f.pending.is_empty());
        assert!(f.sink.stages(&CommandId::new("cmd-1")).contains(&TraceStage::Reconciled));
    }

    #[tokio::test]
    async fn broker_rejection_reconciles_to_failed() {
        let f = fixture();
        let intent = short_entry("cmd-1", None, None);
        f.repository.create(&intent).await.unwrap();
        f.repository
            .update_status(
                &CommandId::new("cmd-1"),
                StatusUpdate::sent(BrokerOrderId::new("240212000222")),
            )
            .await
            .unwrap();

        f.broker.seed_open_order(
            &ClientId::new("ZD0412"),
            BrokerOrderId::new("240212000222"),
            ce_symbol(),
            Product::Nrml,
            Side::Sell,
        );
        f.broker.set_order_status(&BrokerOrderId::new("240212000222"), BrokerOrderStatus::Rejected);

        f.watcher.cycle().await;

        let record = f
            .repository
            .get_by_command_id(&CommandId::new("cmd-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), OrderStatus::Failed);
        assert_eq!(record.failure_reason(), Some("broker status REJECTED"));
    }

    #[tokio::test]
    async fn stale_sent_record_flagged_once_and_left_untouched() {
        let mut config = WatcherConfig::default();
        config.stale_after = ChronoDuration::zero();
        let f = fixture_with(config);

        let intent = short_entry("cmd-1", None, None);
        f.repository.create(&intent).await.unwrap();
        f.repository
            .update_status(
                &CommandId::new("cmd-1"),
                StatusUpdate::sent(BrokerOrderId::new("240212000333")),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        f.watcher.cycle().await;
        f.watcher.cycle().await;

        let record = f
            .repository
            .get_by_command_id(&CommandId::new("cmd-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), OrderStatus::SentToBroker);
        let stale_count = f
            .sink
            .stages(&CommandId::new("cmd-1"))
            .iter()
            .filter(|s| **s == TraceStage::Stale)
            .count();
        assert_eq!(stale_count, 1);
    }
}
