//! Dependency Injection Container
//!
//! Wires adapters into services once at startup. Nothing in the engine is a
//! process-level singleton; every collaborator is an explicit handle owned
//! here, so tests can stand up as many isolated engines as they need.

use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{
    BrokerPort, InstrumentResolverPort, MarketDataPort, TraceSinkPort,
};
use crate::application::services::{
    CommandService, IntentTracker, OrderWatcherService, PendingCommandSet, RiskManagerService,
    Strategy, StrategyEngineService, WatcherConfig,
};
use crate::domain::intent::OrderRepository;
use crate::domain::risk::RiskLimits;
use crate::domain::shared::ClientId;
use crate::infrastructure::http::AppState;

/// Wired dependencies for one engine instance.
pub struct Container<O, B, T, M, I>
where
    O: OrderRepository + 'static,
    B: BrokerPort + 'static,
    T: TraceSinkPort + 'static,
    M: MarketDataPort + 'static,
    I: InstrumentResolverPort + 'static,
{
    broker: Arc<B>,
    market_data: Arc<M>,
    instruments: Arc<I>,
    risk: Arc<RiskManagerService<B>>,
    commands: Arc<CommandService<O, B, T>>,
    watcher: Arc<OrderWatcherService<O, B, T>>,
}

impl<O, B, T, M, I> Container<O, B, T, M, I>
where
    O: OrderRepository + 'static,
    B: BrokerPort + 'static,
    T: TraceSinkPort + 'static,
    M: MarketDataPort + 'static,
    I: InstrumentResolverPort + 'static,
{
    /// Wire all services for `client_id`.
    pub fn new(
        repository: Arc<O>,
        broker: Arc<B>,
        trace_sink: Arc<T>,
        market_data: Arc<M>,
        instruments: Arc<I>,
        client_id: ClientId,
        limits: RiskLimits,
        watcher_config: WatcherConfig,
    ) -> Self {
        let pending = Arc::new(PendingCommandSet::new());
        let risk = Arc::new(RiskManagerService::new(Arc::clone(&broker)));
        risk.register_client(client_id.clone(), limits);

        let commands = Arc::new(CommandService::new(
            Arc::clone(&repository),
            Arc::clone(&broker),
            Arc::clone(&pending),
            Arc::clone(&risk),
            IntentTracker::new(Arc::clone(&trace_sink)),
        ));
        let watcher = Arc::new(OrderWatcherService::new(
            client_id,
            watcher_config,
            repository,
            Arc::clone(&broker),
            IntentTracker::new(trace_sink),
            pending,
            risk.subscribe(),
        ));

        Self {
            broker,
            market_data,
            instruments,
            risk,
            commands,
            watcher,
        }
    }

    /// The risk manager.
    pub fn risk(&self) -> Arc<RiskManagerService<B>> {
        Arc::clone(&self.risk)
    }

    /// The command service.
    pub fn commands(&self) -> Arc<CommandService<O, B, T>> {
        Arc::clone(&self.commands)
    }

    /// The order watcher.
    pub fn watcher(&self) -> Arc<OrderWatcherService<O, B, T>> {
        Arc::clone(&self.watcher)
    }

    /// Create a strategy engine driving `strategy` every `poll_interval`.
    pub fn strategy_engine<S>(
        &self,
        strategy: S,
        poll_interval: Duration,
    ) -> StrategyEngineService<O, B, T, M, I, S>
    where
        S: Strategy<O, B, T, M, I>,
    {
        StrategyEngineService::new(
            Arc::clone(&self.commands),
            Arc::clone(&self.watcher),
            Arc::clone(&self.broker),
            Arc::clone(&self.market_data),
            Arc::clone(&self.instruments),
            strategy,
            poll_interval,
        )
    }

    /// Shared state for the HTTP router.
    pub fn app_state(&self, version: impl Into<String>) -> AppState<O, B, T> {
        AppState {
            commands: Arc::clone(&self.commands),
            watcher: Arc::clone(&self.watcher),
            version: version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{DeltaNeutralStrangle, StrangleConfig};
    use crate::domain::shared::{Exchange, Product, Symbol};
    use crate::infrastructure::broker::PaperBroker;
    use crate::infrastructure::instruments::StaticInstrumentResolver;
    use crate::infrastructure::market_data::FixedMarketData;
    use crate::infrastructure::persistence::{InMemoryOrderRepository, InMemoryTraceSink};
    use chrono::NaiveTime;
    use rust_decimal_macros::dec;

    fn build_container() -> Container<
        InMemoryOrderRepository,
        PaperBroker,
        InMemoryTraceSink,
        FixedMarketData,
        StaticInstrumentResolver,
    > {
        Container::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(PaperBroker::new()),
            Arc::new(InMemoryTraceSink::new()),
            Arc::new(FixedMarketData::new()),
            Arc::new(StaticInstrumentResolver::new()),
            ClientId::new("ZD0412"),
            RiskLimits::default(),
            WatcherConfig::default(),
        )
    }

    #[test]
    fn container_wires_services() {
        let container = build_container();
        let _ = container.commands();
        let _ = container.watcher();
        let _ = container.risk();
    }

    #[test]
    fn container_builds_strategy_engine() {
        let container = build_container();
        let config = StrangleConfig {
            client_id: ClientId::new("ZD0412"),
            underlying: Symbol::new("NIFTY"),
            exchange: Exchange::Nfo,
            product: Product::Nrml,
            lots: 1,
            target_delta: dec!(0.25),
            delta_adjust_trigger: dec!(0.18),
            adjustment_cooldown_secs: 300,
            profit_step: dec!(1500),
            entry_after: NaiveTime::from_hms_opt(3, 50, 0).unwrap(),
            square_off: NaiveTime::from_hms_opt(9, 45, 0).unwrap(),
        };
        let _ = container.strategy_engine(
            DeltaNeutralStrangle::new(config),
            Duration::from_secs(5),
        );
    }

    #[test]
    fn app_state_shares_handles() {
        let container = build_container();
        let state = container.app_state("test");
        assert!(Arc::ptr_eq(&state.commands, &container.commands()));
    }
}
