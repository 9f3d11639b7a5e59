//! Paper broker.
//!
//! A broker that keeps its books in memory: market orders fill instantly at
//! the last set price, everything else rests open until told otherwise.
//! Used for dry runs and as the test double for every service that talks to
//! a broker.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{
    BrokerError, BrokerOrder, BrokerOrderStatus, BrokerPort, BrokerPosition, PlaceOrderParams,
};
use crate::domain::shared::{BrokerOrderId, ClientId, Exchange, Product, Symbol};
use crate::domain::intent::{OrderKind, Side};

#[derive(Debug, Default)]
struct PaperState {
    next_order_seq: u64,
    place_attempts: usize,
    prices: HashMap<String, Decimal>,
    orders: Vec<(ClientId, BrokerOrder)>,
    positions: Vec<(ClientId, BrokerPosition)>,
    reject_next: Option<String>,
    transport_next: Option<String>,
    reject_symbols: HashMap<String, String>,
}

impl PaperState {
    fn position_mut(
        &mut self,
        client_id: &ClientId,
        symbol: &Symbol,
        exchange: Exchange,
        product: Product,
    ) -> &mut BrokerPosition {
        let index = self
            .positions
            .iter()
            .position(|(c, p)| c == client_id && p.symbol == *symbol && p.product == product);
        let index = match index {
            Some(index) => index,
            None => {
                self.positions.push((
                    client_id.clone(),
                    BrokerPosition {
                        symbol: symbol.clone(),
                        exchange,
                        product,
                        net_qty: 0,
                        realized_pnl: Decimal::ZERO,
                        unrealized_pnl: Decimal::ZERO,
                    },
                ));
                self.positions.len() - 1
            }
        };
        &mut self.positions[index].1
    }
}

/// In-memory broker with instant market fills.
#[derive(Debug, Default)]
pub struct PaperBroker {
    state: Mutex<PaperState>,
}

impl PaperBroker {
    /// A broker with empty books.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PaperState::default()),
        }
    }

    /// Set the last traded price for a symbol. Market orders fill at it.
    pub fn set_last_price(&self, symbol: &Symbol, price: Decimal) {
        self.state
            .lock()
            .prices
            .insert(symbol.as_str().to_string(), price);
    }

    /// Seed a position as if it already existed at the broker.
    pub fn seed_position(
        &self,
        client_id: &ClientId,
        symbol: Symbol,
        exchange: Exchange,
        product: Product,
        net_qty: i64,
    ) {
        let mut state = self.state.lock();
        state
            .position_mut(client_id, &symbol, exchange, product)
            .net_qty = net_qty;
    }

    /// Set the PnL the broker reports for a position.
    pub fn set_position_pnl(
        &self,
        client_id: &ClientId,
        symbol: &Symbol,
        realized_pnl: Decimal,
        unrealized_pnl: Decimal,
    ) {
        let mut state = self.state.lock();
        if let Some((_, position)) = state
            .positions
            .iter_mut()
            .find(|(c, p)| c == client_id && p.symbol == *symbol)
        {
            position.realized_pnl = realized_pnl;
            position.unrealized_pnl = unrealized_pnl;
        }
    }

    /// Seed a resting order into the book.
    pub fn seed_open_order(
        &self,
        client_id: &ClientId,
        broker_order_id: BrokerOrderId,
        symbol: Symbol,
        product: Product,
        side: Side,
    ) {
        self.state.lock().orders.push((
            client_id.clone(),
            BrokerOrder {
                broker_order_id,
                symbol,
                product,
                side,
                status: BrokerOrderStatus::Open,
                filled_qty: 0,
                avg_price: None,
            },
        ));
    }

    /// Fill an order in the book.
    pub fn complete_order(&self, broker_order_id: &BrokerOrderId, filled_qty: u32, avg_price: Decimal) {
        let mut state = self.state.lock();
        if let Some((_, order)) = state
            .orders
            .iter_mut()
            .find(|(_, o)| o.broker_order_id == *broker_order_id)
        {
            order.status = BrokerOrderStatus::Complete;
            order.filled_qty = filled_qty;
            order.avg_price = Some(avg_price);
        }
    }

    /// Force a book order into a status.
    pub fn set_order_status(&self, broker_order_id: &BrokerOrderId, status: BrokerOrderStatus) {
        let mut state = self.state.lock();
        if let Some((_, order)) = state
            .orders
            .iter_mut()
            .find(|(_, o)| o.broker_order_id == *broker_order_id)
        {
            order.status = status;
        }
    }

    /// Reject the next placed order with `reason`.
    pub fn reject_next(&self, reason: &str) {
        self.state.lock().reject_next = Some(reason.to_string());
    }

    /// Fail the next placement at the transport layer.
    pub fn fail_transport_next(&self, message: &str) {
        self.state.lock().transport_next = Some(message.to_string());
    }

    /// Reject the next order placed on `symbol` with `reason`.
    pub fn reject_symbol(&self, symbol: &Symbol, reason: &str) {
        self.state
            .lock()
            .reject_symbols
            .insert(symbol.as_str().to_string(), reason.to_string());
    }

    /// Total placement attempts, including refused ones.
    #[must_use]
    pub fn place_attempts(&self) -> usize {
        self.state.lock().place_attempts
    }
}

#[async_trait]
impl BrokerPort for PaperBroker {
    async fn place_order(&self, params: PlaceOrderParams) -> Result<BrokerOrderId, BrokerError> {
        let mut state = self.state.lock();
        state.place_attempts += 1;

        if let Some(message) = state.transport_next.take() {
            return Err(BrokerError::Transport { message });
        }
        if let Some(reason) = state.reject_next.take() {
            return Err(BrokerError::Rejected { reason });
        }
        if let Some(reason) = state.reject_symbols.remove(params.symbol.as_str()) {
            return Err(BrokerError::Rejected { reason });
        }

        state.next_order_seq += 1;
        let broker_order_id = BrokerOrderId::new(format!("9{:09}", state.next_order_seq));

        let fills_now = params.order_kind == OrderKind::Market;
        let fill_price = state
            .prices
            .get(params.symbol.as_str())
            .copied()
            .or(params.price)
            .unwrap_or(Decimal::ZERO);

        let (status, filled_qty, avg_price) = if fills_now {
            (BrokerOrderStatus::Complete, params.quantity, Some(fill_price))
        } else {
            (BrokerOrderStatus::Open, 0, None)
        };
        state.orders.push((
            params.client_id.clone(),
            BrokerOrder {
                broker_order_id: broker_order_id.clone(),
                symbol: params.symbol.clone(),
                product: params.product,
                side: params.side,
                status,
                filled_qty,
                avg_price,
            },
        ));

        if fills_now {
            let signed = match params.side {
                Side::Buy => i64::from(params.quantity),
                Side::Sell => -i64::from(params.quantity),
            };
            state
                .position_mut(&params.client_id, &params.symbol, params.exchange, params.product)
                .net_qty += signed;
        }

        Ok(broker_order_id)
    }

    async fn cancel_order(
        &self,
        _client_id: &ClientId,
        broker_order_id: &BrokerOrderId,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        let Some((_, order)) = state
            .orders
            .iter_mut()
            .find(|(_, o)| o.broker_order_id == *broker_order_id)
        else {
            return Err(BrokerError::NotFound {
                broker_order_id: broker_order_id.as_str().to_string(),
            });
        };
        if order.status == BrokerOrderStatus::Open {
            order.status = BrokerOrderStatus::Cancelled;
        }
        Ok(())
    }

    async fn positions(&self, client_id: &ClientId) -> Result<Vec<BrokerPosition>, BrokerError> {
        Ok(self
            .state
            .lock()
            .positions
            .iter()
            .filter(|(c, _)| c == client_id)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn order_book(&self, client_id: &ClientId) -> Result<Vec<BrokerOrder>, BrokerError> {
        Ok(self
            .state
            .lock()
            .orders
            .iter()
            .filter(|(c, _)| c == client_id)
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn last_traded_price(
        &self,
        _exchange: Exchange,
        symbol: &Symbol,
    ) -> Result<Decimal, BrokerError> {
        self.state
            .lock()
            .prices
            .get(symbol.as_str())
            .copied()
            .ok_or_else(|| BrokerError::Transport {
                message: format!("no price for {symbol}"),
            })
    }
}
