//! Broker Port (Driven Port)
//!
//! Interface to the brokerage the engine trades through. Everything the
//! engine believes about live exposure comes back through this port; local
//! state is never trusted over it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::intent::{OrderIntent, OrderKind, Side};
use crate::domain::shared::{BrokerOrderId, ClientId, Exchange, Product, Symbol};

/// Order placement request derived from an accepted intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderParams {
    /// Trading account to place under.
    pub client_id: ClientId,
    /// Exchange segment.
    pub exchange: Exchange,
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Buy or sell.
    pub side: Side,
    /// Contracts or shares.
    pub quantity: u32,
    /// Market, limit or stop flavor.
    pub order_kind: OrderKind,
    /// Limit price where the kind requires one.
    pub price: Option<Decimal>,
    /// Trigger price where the kind requires one.
    pub trigger_price: Option<Decimal>,
    /// Margin product bucket.
    pub product: Product,
}

impl PlaceOrderParams {
    /// Build placement params from an intent.
    #[must_use]
    pub fn from_intent(intent: &OrderIntent) -> Self {
        Self {
            client_id: intent.client_id().clone(),
            exchange: intent.exchange(),
            symbol: intent.symbol().clone(),
            side: intent.side(),
            quantity: intent.quantity(),
            order_kind: intent.order_kind(),
            price: intent.price(),
            trigger_price: intent.trigger_price(),
            product: intent.product(),
        }
    }
}

/// Broker-side status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerOrderStatus {
    /// Accepted, resting or partially filled.
    Open,
    /// Fully filled.
    Complete,
    /// Cancelled before completion.
    Cancelled,
    /// Rejected by the broker or exchange.
    Rejected,
}

impl BrokerOrderStatus {
    /// Whether the order can still fill.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// One row of the broker order book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerOrder {
    /// Broker-assigned order ID.
    pub broker_order_id: BrokerOrderId,
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Product bucket.
    pub product: Product,
    /// Buy or sell.
    pub side: Side,
    /// Current broker-side status.
    pub status: BrokerOrderStatus,
    /// Quantity filled so far.
    pub filled_qty: u32,
    /// Average fill price, if any quantity filled.
    pub avg_price: Option<Decimal>,
}

/// One row of the broker position book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Exchange segment.
    pub exchange: Exchange,
    /// Product bucket.
    pub product: Product,
    /// Signed net quantity: positive long, negative short, zero flat.
    pub net_qty: i64,
    /// PnL booked on closed quantity today.
    pub realized_pnl: Decimal,
    /// Mark-to-market PnL on the open quantity.
    pub unrealized_pnl: Decimal,
}

impl BrokerPosition {
    /// Combined realized and mark-to-market PnL for the day.
    #[must_use]
    pub fn day_pnl(&self) -> Decimal {
        self.realized_pnl + self.unrealized_pnl
    }

    /// Whether any quantity is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.net_qty != 0
    }
}

/// Broker port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// The broker refused the request.
    #[error("Order rejected: {reason}")]
    Rejected {
        /// Rejection reason from the broker.
        reason: String,
    },

    /// The request never reached a definitive answer.
    #[error("Broker transport error: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// The referenced order does not exist at the broker.
    #[error("Order not found: {broker_order_id}")]
    NotFound {
        /// The missing broker order ID.
        broker_order_id: String,
    },
}

/// Port for broker interactions.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Place an order. Returns the broker-assigned ID on acceptance.
    async fn place_order(&self, params: PlaceOrderParams) -> Result<BrokerOrderId, BrokerError>;

    /// Cancel a resting order.
    async fn cancel_order(
        &self,
        client_id: &ClientId,
        broker_order_id: &BrokerOrderId,
    ) -> Result<(), BrokerError>;

    /// Fetch the position book for a client.
    async fn positions(&self, client_id: &ClientId) -> Result<Vec<BrokerPosition>, BrokerError>;

    /// Fetch the order book for a client.
    async fn order_book(&self, client_id: &ClientId) -> Result<Vec<BrokerOrder>, BrokerError>;

    /// Last traded price for an instrument.
    async fn last_traded_price(
        &self,
        exchange: Exchange,
        symbol: &Symbol,
    ) -> Result<Decimal, BrokerError>;
}
