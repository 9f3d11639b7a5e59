//! Delta-Neutral Short Strangle
//!
//! Sells a call and a put near a target delta and keeps the book flat by
//! rolling whichever leg drifts. The phase machine lives in
//! [`StrangleState`]; this service feeds it broker outcomes and market
//! quotes, one tick at a time.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::application::ports::{
    BrokerPort, InstrumentResolverPort, MarketDataPort, OptionKind, OptionQuote, TraceSinkPort,
};
use crate::application::services::strategy_engine::{Strategy, StrategyContext};
use crate::application::services::watcher::ExitRequest;
use crate::domain::exits::PositionDirection;
use crate::domain::intent::{
    ExecutionType, IntentParams, IntentSource, OrderIntent, OrderKind, OrderRepository,
    OrderStatus, Side,
};
use crate::domain::shared::{ClientId, CommandId, Exchange, Product, Symbol, Timestamp};
use crate::domain::strategy::{Leg, LegSlot, StranglePhase, StrangleState, StrategyError};

/// Strangle tunables, loaded with the engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrangleConfig {
    /// Client the strangle trades for.
    pub client_id: ClientId,
    /// Underlying index or stock, resolved for lot size.
    pub underlying: Symbol,
    /// Exchange segment for the legs.
    pub exchange: Exchange,
    /// Product bucket for the legs.
    pub product: Product,
    /// Number of lots per leg.
    pub lots: u32,
    /// Delta magnitude both legs are sold at.
    pub target_delta: Decimal,
    /// Net position delta past which the drifting leg is rolled.
    pub delta_adjust_trigger: Decimal,
    /// Minimum quiet period between rolls, in seconds.
    pub adjustment_cooldown_secs: u64,
    /// Booked profit (realized plus marks) that ends the round trip.
    pub profit_step: Decimal,
    /// No entries before this UTC wall-clock time.
    pub entry_after: NaiveTime,
    /// Everything is closed at this UTC wall-clock time.
    pub square_off: NaiveTime,
}

impl StrangleConfig {
    fn cooldown(&self) -> ChronoDuration {
        ChronoDuration::seconds(i64::try_from(self.adjustment_cooldown_secs).unwrap_or(i64::MAX))
    }

    fn in_entry_window(&self, now: Timestamp) -> bool {
        let time = now.time_of_day();
        time >= self.entry_after && time < self.square_off
    }
}

/// A leg order in flight. `command_id` is `None` when the submission was
/// refused outright; the fill poll treats that as failed.
struct PendingLeg {
    command_id: Option<CommandId>,
    quote: OptionQuote,
    quantity: u32,
}

struct PendingEntry {
    ce: PendingLeg,
    pe: PendingLeg,
}

struct PendingRoll {
    close_id: CommandId,
    open_id: CommandId,
    replacement: OptionQuote,
    quantity: u32,
}

enum LegOutcome {
    Pending,
    Failed,
    Filled(Leg),
}

/// Short strangle kept delta-neutral by rolling the drifting leg.
pub struct DeltaNeutralStrangle {
    config: StrangleConfig,
    state: StrangleState,
    pending_entry: Option<PendingEntry>,
    pending_roll: Option<PendingRoll>,
}

impl DeltaNeutralStrangle {
    /// A fresh, idle strangle.
    #[must_use]
    pub const fn new(config: StrangleConfig) -> Self {
        Self {
            config,
            state: StrangleState::new(),
            pending_entry: None,
            pending_roll: None,
        }
    }

    /// Current phase machine, read only.
    #[must_use]
    pub const fn state(&self) -> &StrangleState {
        &self.state
    }

    async fn advance<O, B, T, M, I>(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        match self.state.phase() {
            StranglePhase::Idle => {
                if self.config.in_entry_window(ctx.now) {
                    self.enter(ctx).await?;
                }
                Ok(())
            }
            StranglePhase::Entering => self.poll_entry(ctx).await,
            StranglePhase::Active => self.manage_active(ctx).await,
            StranglePhase::Adjusting => self.poll_roll(ctx).await,
            StranglePhase::Exiting => self.poll_flat(ctx).await,
        }
    }

    /// Resolve the contract, pick both legs, and submit both entries.
    async fn enter<O, B, T, M, I>(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        self.state.begin_entry()?;

        let resolved = match ctx
            .instruments
            .resolve(self.config.exchange, &self.config.underlying)
            .await
        {
            Ok(resolved) => resolved,
            Err(err) => {
                self.state.abort_entry()?;
                return Err(StrategyError::ConfigResolutionFailed {
                    reason: err.to_string(),
                });
            }
        };
        if !resolved.accepts(OrderKind::Market) {
            self.state.abort_entry()?;
            return Err(StrategyError::ConfigResolutionFailed {
                reason: format!("{} does not accept market orders", self.config.underlying),
            });
        }
        let quantity = resolved.lot_size * self.config.lots;

        let ce = match ctx
            .market_data
            .nearest_option(self.config.target_delta, OptionKind::Call)
            .await
        {
            Ok(quote) => quote,
            Err(err) => {
                self.state.abort_entry()?;
                return Err(StrategyError::MarketUnavailable {
                    reason: err.to_string(),
                });
            }
        };
        let pe = match ctx
            .market_data
            .nearest_option(self.config.target_delta, OptionKind::Put)
            .await
        {
            Ok(quote) => quote,
            Err(err) => {
                self.state.abort_entry()?;
                return Err(StrategyError::MarketUnavailable {
                    reason: err.to_string(),
                });
            }
        };

        let ce_id = self
            .submit_leg(ctx, &ce.symbol, Side::Sell, quantity, ExecutionType::Entry)
            .await;
        let Some(ce_id) = ce_id else {
            // First leg refused outright: nothing is at risk yet.
            self.state.abort_entry()?;
            return Err(StrategyError::ExecutionRejected {
                reason: format!("{} entry refused", ce.symbol),
            });
        };
        let pe_id = self
            .submit_leg(ctx, &pe.symbol, Side::Sell, quantity, ExecutionType::Entry)
            .await;
        // A refused second leg is left to the fill poll, which unwinds the
        // first leg as a partial entry once its outcome is known.

        info!(underlying = %self.config.underlying, quantity, ce = %ce.symbol, pe = %pe.symbol, "strangle entry submitted");
        self.pending_entry = Some(PendingEntry {
            ce: PendingLeg {
                command_id: Some(ce_id),
                quote: ce,
                quantity,
            },
            pe: PendingLeg {
                command_id: pe_id,
                quote: pe,
                quantity,
            },
        });
        Ok(())
    }

    /// Wait for both entry legs. Both filled makes the strangle active; a
    /// filled leg opposite a failed one is unwound so a naked leg never
    /// stands.
    async fn poll_entry<O, B, T, M, I>(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        let Some(pending) = self.pending_entry.as_ref() else {
            // Nothing staged for this phase; give it up.
            self.state.abort_entry()?;
            return Ok(());
        };
        let ce = Self::leg_outcome(ctx, &pending.ce).await?;
        let pe = Self::leg_outcome(ctx, &pending.pe).await?;

        match (ce, pe) {
            (LegOutcome::Filled(ce_leg), LegOutcome::Filled(pe_leg)) => {
                self.pending_entry = None;
                self.state.confirm_entry(ce_leg, pe_leg)?;
                self.state.set_profit_target(Some(self.config.profit_step));
                info!(net_delta = %self.state.net_delta(), "strangle active");
                Ok(())
            }
            (LegOutcome::Filled(leg), LegOutcome::Failed)
            | (LegOutcome::Failed, LegOutcome::Filled(leg)) => {
                warn!(symbol = %leg.symbol(), "partial entry, unwinding the filled leg");
                ctx.watcher.request_exit(ExitRequest {
                    client_id: self.config.client_id.clone(),
                    exchange: self.config.exchange,
                    symbol: leg.symbol().clone(),
                    product: self.config.product,
                    reason: "partial entry unwind".to_string(),
                });
                self.pending_entry = None;
                self.state.abort_entry()?;
                Ok(())
            }
            (LegOutcome::Failed, LegOutcome::Failed) => {
                warn!("both entry legs failed");
                self.pending_entry = None;
                self.state.abort_entry()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Refresh marks, then decide: book profit, square off, or roll the
    /// drifting leg. Decisions are only made on fresh quotes.
    async fn manage_active<O, B, T, M, I>(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        self.refresh_quotes(ctx).await?;

        if self.state.profit_target_hit() {
            return self.exit_all(ctx, "profit step reached").await;
        }
        if ctx.now.time_of_day() >= self.config.square_off {
            return self.exit_all(ctx, "square off").await;
        }
        if let Some(slot) = self.state.drifting_leg(self.config.delta_adjust_trigger) {
            if self.state.cooldown_elapsed(ctx.now, self.config.cooldown()) {
                return self.roll_leg(ctx, slot).await;
            }
        }
        Ok(())
    }

    async fn refresh_quotes<O, B, T, M, I>(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        for slot in [LegSlot::Call, LegSlot::Put] {
            let Some(leg) = self.state.leg(slot) else {
                continue;
            };
            let symbol = leg.symbol().clone();
            let quote = ctx.market_data.quote(&symbol).await.map_err(|err| {
                StrategyError::MarketUnavailable {
                    reason: err.to_string(),
                }
            })?;
            self.state.update_quote(slot, quote.price, quote.delta);
        }
        Ok(())
    }

    /// Close the drifting leg and open its replacement as one unit. Either
    /// refusal reverts the machine to the prior leg; the broker books
    /// reconcile through the watcher.
    async fn roll_leg<O, B, T, M, I>(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
        slot: LegSlot,
    ) -> Result<(), StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        self.state.begin_adjustment(slot, self.config.target_delta)?;
        let kind = match slot {
            LegSlot::Call => OptionKind::Call,
            LegSlot::Put => OptionKind::Put,
        };
        let replacement = match ctx
            .market_data
            .nearest_option(self.config.target_delta, kind)
            .await
        {
            Ok(quote) => quote,
            Err(err) => {
                self.state.revert_adjustment()?;
                return Err(StrategyError::MarketUnavailable {
                    reason: err.to_string(),
                });
            }
        };
        let prior = self
            .state
            .pending_adjustment()
            .map(|p| p.prior_leg.clone())
            .ok_or(StrategyError::NoAdjustmentInFlight)?;

        let close_id = self
            .submit_leg(ctx, prior.symbol(), Side::Buy, prior.quantity(), ExecutionType::Adjust)
            .await;
        let Some(close_id) = close_id else {
            self.state.revert_adjustment()?;
            error!(symbol = %prior.symbol(), "roll close refused, adjustment abandoned");
            return Err(StrategyError::ExecutionRejected {
                reason: format!("{} roll close refused", prior.symbol()),
            });
        };
        let open_id = self
            .submit_leg(ctx, &replacement.symbol, Side::Sell, prior.quantity(), ExecutionType::Adjust)
            .await;
        let Some(open_id) = open_id else {
            // The close may already be working at the broker; the machine
            // keeps the prior leg and the books reconcile through the
            // watcher.
            self.state.revert_adjustment()?;
            error!(symbol = %replacement.symbol, "roll open refused after close accepted");
            return Err(StrategyError::ExecutionRejected {
                reason: format!("{} roll open refused", replacement.symbol),
            });
        };

        info!(%slot, close = %prior.symbol(), open = %replacement.symbol, "roll submitted");
        self.pending_roll = Some(PendingRoll {
            close_id,
            open_id,
            replacement,
            quantity: prior.quantity(),
        });
        Ok(())
    }

    /// Wait for both roll legs. Both filled swaps the leg in place and
    /// realizes the closed leg's PnL; any failure restores the prior leg.
    async fn poll_roll<O, B, T, M, I>(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        let Some(pending) = self.pending_roll.as_ref() else {
            self.state.revert_adjustment()?;
            return Ok(());
        };
        let close = Self::record_status(ctx, &pending.close_id).await?;
        let open = Self::record_status(ctx, &pending.open_id).await?;

        match (close, open) {
            (Some((OrderStatus::Executed, close_avg)), Some((OrderStatus::Executed, open_avg))) => {
                let replacement = Leg::new(
                    pending.replacement.symbol.clone(),
                    PositionDirection::Short,
                    open_avg.unwrap_or(pending.replacement.price),
                    pending.replacement.delta,
                    pending.quantity,
                );
                let prior = self
                    .state
                    .pending_adjustment()
                    .map(|p| p.prior_leg.clone())
                    .ok_or(StrategyError::NoAdjustmentInFlight)?;
                let close_price = close_avg.unwrap_or_else(|| prior.current_price());
                let closed_pnl = Decimal::from(prior.direction().sign())
                    * (close_price - prior.entry_price())
                    * Decimal::from(prior.quantity());
                self.pending_roll = None;
                self.state.complete_adjustment(replacement, closed_pnl, ctx.now)?;
                info!(realized = %closed_pnl, "roll complete");
                Ok(())
            }
            (Some((OrderStatus::Failed, _)), _) | (_, Some((OrderStatus::Failed, _))) | (None, _) | (_, None) => {
                error!("roll leg failed at the broker, restoring prior leg state");
                self.pending_roll = None;
                self.state.revert_adjustment()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Wait for the broker to confirm both legs flat, then realize.
    async fn poll_flat<O, B, T, M, I>(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        let positions = ctx
            .broker
            .positions(&self.config.client_id)
            .await
            .map_err(|err| StrategyError::MarketUnavailable {
                reason: err.to_string(),
            })?;
        let leg_symbols: Vec<Symbol> = self
            .state
            .ce_leg()
            .into_iter()
            .chain(self.state.pe_leg())
            .map(|leg| leg.symbol().clone())
            .collect();
        let any_open = positions
            .iter()
            .any(|p| p.is_open() && leg_symbols.contains(&p.symbol));
        if any_open {
            return Ok(());
        }

        let exit_pnl: Decimal = self
            .state
            .ce_leg()
            .into_iter()
            .chain(self.state.pe_leg())
            .map(Leg::unrealized_pnl)
            .sum();
        self.state.confirm_flat(exit_pnl)?;
        info!(realized = %self.state.realized_pnl(), "strangle flat");
        Ok(())
    }

    async fn exit_all<O, B, T, M, I>(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
        reason: &str,
    ) -> Result<(), StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        self.state.begin_exit()?;
        for leg in self.state.ce_leg().into_iter().chain(self.state.pe_leg()) {
            ctx.watcher.request_exit(ExitRequest {
                client_id: self.config.client_id.clone(),
                exchange: self.config.exchange,
                symbol: leg.symbol().clone(),
                product: self.config.product,
                reason: reason.to_string(),
            });
        }
        info!(reason, "strangle exit requested");
        Ok(())
    }

    /// Submit one leg order. Refusals come back as `None` and are logged;
    /// what that means is the caller's decision.
    async fn submit_leg<O, B, T, M, I>(
        &self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
        symbol: &Symbol,
        side: Side,
        quantity: u32,
        execution_type: ExecutionType,
    ) -> Option<CommandId>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        let command_id = CommandId::generate();
        let intent = match OrderIntent::new(IntentParams {
            command_id: command_id.clone(),
            client_id: self.config.client_id.clone(),
            execution_type,
            exchange: self.config.exchange,
            symbol: symbol.clone(),
            side,
            quantity,
            order_kind: OrderKind::Market,
            price: None,
            trigger_price: None,
            stop_loss: None,
            target: None,
            product: self.config.product,
            source: IntentSource::Strategy,
        }) {
            Ok(intent) => intent,
            Err(err) => {
                warn!(%symbol, error = %err, "leg intent rejected by validation");
                return None;
            }
        };
        match ctx.commands.submit(intent).await {
            Ok(outcome) if outcome.is_accepted() => Some(command_id),
            Ok(outcome) => {
                warn!(%symbol, ?outcome, "leg not accepted");
                None
            }
            Err(error) => {
                warn!(%symbol, %error, "leg submission failed");
                None
            }
        }
    }

    async fn leg_outcome<O, B, T, M, I>(
        ctx: &StrategyContext<'_, O, B, T, M, I>,
        leg: &PendingLeg,
    ) -> Result<LegOutcome, StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        let Some(command_id) = &leg.command_id else {
            return Ok(LegOutcome::Failed);
        };
        let record = Self::record_status(ctx, command_id).await?;
        Ok(match record {
            Some((OrderStatus::Executed, avg_price)) => LegOutcome::Filled(Leg::new(
                leg.quote.symbol.clone(),
                PositionDirection::Short,
                avg_price.unwrap_or(leg.quote.price),
                leg.quote.delta,
                leg.quantity,
            )),
            Some((OrderStatus::Failed, _)) | None => LegOutcome::Failed,
            Some(_) => LegOutcome::Pending,
        })
    }

    async fn record_status<O, B, T, M, I>(
        ctx: &StrategyContext<'_, O, B, T, M, I>,
        command_id: &CommandId,
    ) -> Result<Option<(OrderStatus, Option<Decimal>)>, StrategyError>
    where
        O: OrderRepository,
        B: BrokerPort,
        T: TraceSinkPort,
        M: MarketDataPort,
        I: InstrumentResolverPort,
    {
        let record = ctx.commands.lookup(command_id).await.map_err(|err| {
            StrategyError::ExecutionRejected {
                reason: err.to_string(),
            }
        })?;
        Ok(record.map(|r| (r.status(), r.avg_price())))
    }
}

#[async_trait]
impl<O, B, T, M, I> Strategy<O, B, T, M, I> for DeltaNeutralStrangle
where
    O: OrderRepository,
    B: BrokerPort,
    T: TraceSinkPort,
    M: MarketDataPort,
    I: InstrumentResolverPort,
{
    async fn submit_entry(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError> {
        self.enter(ctx).await
    }

    async fn evaluate_tick(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
    ) -> Result<(), StrategyError> {
        self.advance(ctx).await
    }

    async fn submit_exit(
        &mut self,
        ctx: &StrategyContext<'_, O, B, T, M, I>,
        reason: &str,
    ) -> Result<(), StrategyError> {
        self.exit_all(ctx, reason).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ResolvedInstrument;
    use crate::application::services::commands::CommandService;
    use crate::application::services::pending::PendingCommandSet;
    use crate::application::services::risk_manager::RiskManagerService;
    use crate::application::services::tracker::IntentTracker;
    use crate::application::services::watcher::{OrderWatcherService, WatcherConfig};
    use crate::domain::risk::RiskLimits;
    use crate::infrastructure::broker::PaperBroker;
    use crate::infrastructure::instruments::StaticInstrumentResolver;
    use crate::infrastructure::market_data::FixedMarketData;
    use crate::infrastructure::persistence::{InMemoryOrderRepository, InMemoryTraceSink};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    type Ctx<'a> = StrategyContext<
        'a,
        InMemoryOrderRepository,
        PaperBroker,
        InMemoryTraceSink,
        FixedMarketData,
        StaticInstrumentResolver,
    >;

    struct Fixture {
        commands: Arc<CommandService<InMemoryOrderRepository, PaperBroker, InMemoryTraceSink>>,
        watcher: Arc<OrderWatcherService<InMemoryOrderRepository, PaperBroker, InMemoryTraceSink>>,
        broker: Arc<PaperBroker>,
        market: Arc<FixedMarketData>,
        instruments: Arc<StaticInstrumentResolver>,
    }

    impl Fixture {
        fn ctx(&self, now: Timestamp) -> Ctx<'_> {
            StrategyContext {
                commands: self.commands.as_ref(),
                watcher: self.watcher.as_ref(),
                broker: self.broker.as_ref(),
                market_data: self.market.as_ref(),
                instruments: self.instruments.as_ref(),
                now,
            }
        }
    }

    fn ce_symbol() -> Symbol {
        Symbol::new("NIFTY25MAR23400CE")
    }

    fn pe_symbol() -> Symbol {
        Symbol::new("NIFTY25MAR22800PE")
    }

    fn config() -> StrangleConfig {
        StrangleConfig {
            client_id: ClientId::new("ZD0412"),
            underlying: Symbol::new("NIFTY"),
            exchange: Exchange::Nfo,
            product: Product::Nrml,
            lots: 1,
            target_delta: dec!(0.15),
            delta_adjust_trigger: dec!(10),
            adjustment_cooldown_secs: 300,
            profit_step: dec!(5000),
            entry_after: NaiveTime::from_hms_opt(3, 45, 0).unwrap(),
            square_off: NaiveTime::from_hms_opt(9, 45, 0).unwrap(),
        }
    }

    fn at(hour: u32, minute: u32) -> Timestamp {
        Timestamp::new(Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap())
    }

    fn fixture() -> (DeltaNeutralStrangle, Fixture) {
        let repository = Arc::new(InMemoryOrderRepository::new());
        let broker = Arc::new(PaperBroker::new());
        let pending = Arc::new(PendingCommandSet::new());
        let sink = Arc::new(InMemoryTraceSink::new());
        let risk = Arc::new(RiskManagerService::new(Arc::clone(&broker)));
        risk.register_client(ClientId::new("ZD0412"), RiskLimits::default());
        let commands = Arc::new(CommandService::new(
            Arc::clone(&repository),
            Arc::clone(&broker),
            Arc::clone(&pending),
            risk,
            IntentTracker::new(Arc::clone(&sink)),
        ));
        let (_forced_tx, forced_rx) = broadcast::channel(16);
        let watcher = Arc::new(OrderWatcherService::new(
            ClientId::new("ZD0412"),
            WatcherConfig::default(),
            Arc::clone(&repository),
            Arc::clone(&broker),
            IntentTracker::new(Arc::clone(&sink)),
            Arc::clone(&pending),
            forced_rx,
        ));

        let market = Arc::new(FixedMarketData::new());
        market.set_spot(dec!(23100));
        market.set_nearest(
            OptionKind::Call,
            OptionQuote {
                symbol: ce_symbol(),
                delta: dec!(0.15),
                price: dec!(100),
            },
        );
        market.set_nearest(
            OptionKind::Put,
            OptionQuote {
                symbol: pe_symbol(),
                delta: dec!(-0.15),
                price: dec!(95),
            },
        );
        market.set_quote(OptionQuote {
            symbol: ce_symbol(),
            delta: dec!(0.15),
            price: dec!(100),
        });
        market.set_quote(OptionQuote {
            symbol: pe_symbol(),
            delta: dec!(-0.15),
            price: dec!(95),
        });

        let instruments = Arc::new(StaticInstrumentResolver::new());
        instruments.register(
            Exchange::Nfo,
            Symbol::new("NIFTY"),
            ResolvedInstrument {
                expiry: NaiveDate::from_ymd_opt(2025, 3, 27).unwrap(),
                lot_size: 75,
                order_kinds: vec![OrderKind::Market, OrderKind::Limit],
            },
        );

        broker.set_last_price(&ce_symbol(), dec!(100));
        broker.set_last_price(&pe_symbol(), dec!(95));

        let strangle = DeltaNeutralStrangle::new(config());
        let fixture = Fixture {
            commands,
            watcher,
            broker,
            market,
            instruments,
        };
        (strangle, fixture)
    }

    /// Entry tick, reconcile, confirmation tick.
    async fn activate(strangle: &mut DeltaNeutralStrangle, f: &Fixture) {
        let ctx = f.ctx(at(5, 0));
        strangle.evaluate_tick(&ctx).await.unwrap();
        assert_eq!(strangle.state().phase(), StranglePhase::Entering);
        f.watcher.cycle().await;
        strangle.evaluate_tick(&ctx).await.unwrap();
        assert_eq!(strangle.state().phase(), StranglePhase::Active);
    }

    #[tokio::test]
    async fn entry_fills_both_legs_then_activates() {
        let (mut strangle, f) = fixture();
        activate(&mut strangle, &f).await;

        assert!(strangle.state().has_legs());
        assert_eq!(f.broker.place_attempts(), 2);
        // Short call delta cancels short put delta at entry.
        assert_eq!(strangle.state().net_delta(), dec!(0));
        assert_eq!(strangle.state().next_profit_target(), Some(dec!(5000)));
        let ce = strangle.state().ce_leg().unwrap();
        assert_eq!(ce.entry_price(), dec!(100));
        assert_eq!(ce.quantity(), 75);
    }

    #[tokio::test]
    async fn no_entry_outside_window() {
        let (mut strangle, f) = fixture();
        let ctx = f.ctx(at(2, 0));
        strangle.evaluate_tick(&ctx).await.unwrap();

        assert_eq!(strangle.state().phase(), StranglePhase::Idle);
        assert_eq!(f.broker.place_attempts(), 0);
    }

    #[tokio::test]
    async fn partial_entry_unwinds_filled_leg() {
        let (mut strangle, f) = fixture();
        f.broker.reject_symbol(&pe_symbol(), "margin blocked");

        let ctx = f.ctx(at(5, 0));
        strangle.evaluate_tick(&ctx).await.unwrap();
        assert_eq!(strangle.state().phase(), StranglePhase::Entering);

        // CE filled, PE refused. The poll unwinds the CE leg via the
        // watcher and goes back to idle.
        f.watcher.cycle().await;
        strangle.evaluate_tick(&ctx).await.unwrap();
        assert_eq!(strangle.state().phase(), StranglePhase::Idle);
        assert!(!strangle.state().has_legs());

        // Next watcher cycle serves the unwind request and flattens.
        f.watcher.cycle().await;
        let positions = f.broker.positions(&ClientId::new("ZD0412")).await.unwrap();
        let ce_net = positions
            .iter()
            .find(|p| p.symbol == ce_symbol())
            .map_or(0, |p| p.net_qty);
        assert_eq!(ce_net, 0);
    }

    #[tokio::test]
    async fn drift_rolls_the_put_leg() {
        let (mut strangle, f) = fixture();
        activate(&mut strangle, &f).await;

        // Put delta blows out: net delta 18.75 breaches the trigger of 10.
        f.market.set_quote(OptionQuote {
            symbol: pe_symbol(),
            delta: dec!(-0.40),
            price: dec!(120),
        });
        let replacement = Symbol::new("NIFTY25MAR23000PE");
        f.market.set_nearest(
            OptionKind::Put,
            OptionQuote {
                symbol: replacement.clone(),
                delta: dec!(-0.16),
                price: dec!(80),
            },
        );
        f.broker.set_last_price(&pe_symbol(), dec!(120));
        f.broker.set_last_price(&replacement, dec!(80));

        let ctx = f.ctx(at(6, 0));
        strangle.evaluate_tick(&ctx).await.unwrap();
        assert_eq!(strangle.state().phase(), StranglePhase::Adjusting);
        assert_eq!(f.broker.place_attempts(), 4);

        f.watcher.cycle().await;
        strangle.evaluate_tick(&ctx).await.unwrap();
        assert_eq!(strangle.state().phase(), StranglePhase::Active);
        assert_eq!(strangle.state().pe_leg().unwrap().symbol(), &replacement);
        // Bought the 95 entry back at 120.
        assert_eq!(strangle.state().realized_pnl(), dec!(-1875));

        // Replacement drifts too, but the cooldown holds further rolls.
        f.market.set_quote(OptionQuote {
            symbol: replacement,
            delta: dec!(-0.40),
            price: dec!(110),
        });
        strangle.evaluate_tick(&ctx).await.unwrap();
        assert_eq!(strangle.state().phase(), StranglePhase::Active);
        assert_eq!(f.broker.place_attempts(), 4);
    }

    #[tokio::test]
    async fn profit_step_exits_and_returns_to_idle() {
        let (mut strangle, f) = fixture();
        activate(&mut strangle, &f).await;

        // Premium decay: 60 on the call, 55 on the put, 8625 total.
        f.market.set_quote(OptionQuote {
            symbol: ce_symbol(),
            delta: dec!(0.10),
            price: dec!(40),
        });
        f.market.set_quote(OptionQuote {
            symbol: pe_symbol(),
            delta: dec!(-0.10),
            price: dec!(40),
        });
        f.broker.set_last_price(&ce_symbol(), dec!(40));
        f.broker.set_last_price(&pe_symbol(), dec!(40));

        let ctx = f.ctx(at(6, 0));
        strangle.evaluate_tick(&ctx).await.unwrap();
        assert_eq!(strangle.state().phase(), StranglePhase::Exiting);

        f.watcher.cycle().await;
        strangle.evaluate_tick(&ctx).await.unwrap();
        assert_eq!(strangle.state().phase(), StranglePhase::Idle);
        assert!(!strangle.state().has_legs());
        assert_eq!(strangle.state().realized_pnl(), dec!(8625));
    }

    #[tokio::test]
    async fn square_off_time_forces_exit() {
        let (mut strangle, f) = fixture();
        activate(&mut strangle, &f).await;

        let attempts_before = f.broker.place_attempts();
        let ctx = f.ctx(at(10, 0));
        strangle.evaluate_tick(&ctx).await.unwrap();
        assert_eq!(strangle.state().phase(), StranglePhase::Exiting);

        // The watcher serves the requested exits.
        f.watcher.cycle().await;
        assert_eq!(f.broker.place_attempts(), attempts_before + 2);
    }
}
