//! Strategy Engine
//!
//! Drives the configured strategy on its own clock. The strategy owns its
//! phase machine; the engine only builds the per-tick context and reports
//! failures. Entries and adjustments go through the command service, exits
//! always go through the order watcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::ports::{BrokerPort, InstrumentResolverPort, MarketDataPort, TraceSinkPort};
use crate::application::services::commands::CommandService;
use crate::application::services::watcher::OrderWatcherService;
use crate::domain::intent::OrderRepository;
use crate::domain::shared::Timestamp;
use crate::domain::strategy::StrategyError;

/// Closed set of runnable strategies, selected at configuration load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Short strangle held delta-neutral by rolling the drifting leg.
    DeltaNeutralStrangle,
}

/// Everything a strategy may touch during one tick.
pub struct StrategyContext<'a, O, B, T: TraceSinkPort, M, I> {
    /// Entry and adjustment submissions, plus record lookups.
    pub commands: &'a CommandService<O, B, T>,
    /// Exit requests.
    pub watcher: &'a OrderWatcherService<O, B, T>,
    /// Broker books, read only.
    pub broker: &'a B,
    /// Option chain lookups.
    pub market_data: &'a M,
    /// Contract metadata.
    pub instruments: &'a I,
    /// Tick time.
    pub now: Timestamp,
}

/// A tradeable strategy.
///
/// `evaluate_tick` is the drumbeat and may call the other two itself;
/// `submit_entry` and `submit_exit` stay public so an operator surface can
/// force either.
#[async_trait]
pub trait Strategy<O, B, T: TraceSinkPort, M, I>: Send {
    /// Open a position now.
    async fn submit_entry(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError>;

    /// Advance the phase machine one step.
    async fn evaluate_tick(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError>;

    /// Close everything, via the watcher.
    async fn submit_exit(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
        reason: &str,
    ) -> Result<(), StrategyError>;
}

/// Owns one strategy instance and ticks it until shutdown.
pub struct StrategyEngineService<O, B, T: TraceSinkPort, M, I, S> {
    commands: Arc<CommandService<O, B, T>>,
    watcher: Arc<OrderWatcherService<O, B, T>>,
    broker: Arc<B>,
    market_data: Arc<M>,
    instruments: Arc<I>,
    strategy: S,
    poll_interval: Duration,
}

impl<O, B, T, M, I, S> StrategyEngineService<O, B, T, M, I, S>
where
    O: OrderRepository,
    B: BrokerPort,
    T: TraceSinkPort,
    M: MarketDataPort,
    I: InstrumentResolverPort,
    S: Strategy<O, B, T, M, I>,
{
    /// Wire an engine around `strategy`.
    pub fn new(
        commands: Arc<CommandService<O, B, T>>,
        watcher: Arc<OrderWatcherService<O, B, T>>,
        broker: Arc<B>,
        market_data: Arc<M>,
        instruments: Arc<I>,
        strategy: S,
        poll_interval: Duration,
    ) -> Self {
        Self {
            commands,
            watcher,
            broker,
            market_data,
            instruments,
            strategy,
            poll_interval,
        }
    }

    /// One strategy tick. Failures are reported, not fatal: the next tick
    /// sees a fresh context.
    pub async fn tick(&mut self) {
        let ctx = StrategyContext {
            commands: self.commands.as_ref(),
            watcher: self.watcher.as_ref(),
            broker: self.broker.as_ref(),
            market_data: self.market_data.as_ref(),
            instruments: self.instruments.as_ref(),
            now: Timestamp::now(),
        };
        if let Err(error) = self.strategy.evaluate_tick(&ctx).await {
            warn!(%error, "strategy tick failed");
        }
    }

    /// Tick until cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                () = shutdown.cancelled() => {
                    info!("Strategy engine shutting down");
                    break;
                }
            }
        }
    }
}
