//! HTTP request DTOs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::intent::{
    ExecutionType, IntentError, IntentParams, IntentSource, OrderIntent, OrderKind, Side,
};
use crate::domain::shared::{ClientId, CommandId, Exchange, Product, Symbol};

/// Request to submit an ENTRY or ADJUST intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitIntentRequest {
    /// Idempotency key. Generated when the caller sends none.
    #[serde(default)]
    pub command_id: Option<String>,
    /// Trading account at the broker.
    pub client_id: String,
    /// ENTRY or ADJUST. EXIT is refused; use the exits endpoint.
    pub execution_type: ExecutionType,
    /// Exchange segment.
    pub exchange: Exchange,
    /// Instrument symbol.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Quantity in units.
    pub quantity: u32,
    /// Order kind.
    #[serde(default = "default_order_kind")]
    pub order_kind: OrderKind,
    /// Limit price for LIMIT and SL kinds.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Trigger price for SL and SL-M kinds.
    #[serde(default)]
    pub trigger_price: Option<Decimal>,
    /// Stop-loss level for the watcher to enforce after the fill.
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    /// Target level for the watcher to enforce after the fill.
    #[serde(default)]
    pub target: Option<Decimal>,
    /// Product the position books under.
    #[serde(default = "default_product")]
    pub product: Product,
    /// Which subsystem authored the intent.
    #[serde(default = "default_source")]
    pub source: IntentSource,
}

const fn default_order_kind() -> OrderKind {
    OrderKind::Market
}

const fn default_product() -> Product {
    Product::Nrml
}

const fn default_source() -> IntentSource {
    IntentSource::Webhook
}

impl SubmitIntentRequest {
    /// Build the validated intent.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::InvalidIntent`] when a field fails domain
    /// validation.
    pub fn into_intent(self) -> Result<OrderIntent, IntentError> {
        let command_id = self
            .command_id
            .map_or_else(CommandId::generate, CommandId::new);
        OrderIntent::new(IntentParams {
            command_id,
            client_id: ClientId::new(self.client_id),
            execution_type: self.execution_type,
            exchange: self.exchange,
            symbol: Symbol::new(self.symbol),
            side: self.side,
            quantity: self.quantity,
            order_kind: self.order_kind,
            price: self.price,
            trigger_price: self.trigger_price,
            stop_loss: self.stop_loss,
            target: self.target,
            product: self.product,
            source: self.source,
        })
    }
}

/// Request to flatten a position.
///
/// The watcher resolves the actual quantity from the broker and originates
/// the exit order; callers only name the position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenRequest {
    /// Trading account at the broker.
    pub client_id: String,
    /// Exchange segment of the position.
    pub exchange: Exchange,
    /// Symbol of the position.
    pub symbol: String,
    /// Product the position books under.
    #[serde(default = "default_product")]
    pub product: Product,
    /// Why the exit was requested, kept in the audit trail.
    pub reason: String,
}
