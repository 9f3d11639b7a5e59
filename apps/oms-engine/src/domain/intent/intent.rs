//! Order intent: the immutable description of a requested trading action.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::IntentError;
use super::value_objects::{ExecutionType, IntentSource, LogicalKey, OrderKind, Side};
use crate::domain::shared::{ClientId, CommandId, Exchange, Product, Symbol, Timestamp};

/// Parameters for building an [`OrderIntent`].
///
/// Callers fill these in; [`OrderIntent::new`] validates them.
#[derive(Debug, Clone)]
pub struct IntentParams {
    /// Caller-supplied idempotency key.
    pub command_id: CommandId,
    /// Trading account at the broker.
    pub client_id: ClientId,
    /// ENTRY, ADJUST or EXIT.
    pub execution_type: ExecutionType,
    /// Exchange segment.
    pub exchange: Exchange,
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Buy or sell.
    pub side: Side,
    /// Quantity in units (contracts x lot size). Must be positive.
    pub quantity: u32,
    /// Market, limit or stop variant.
    pub order_kind: OrderKind,
    /// Limit price, required by LIMIT and SL kinds.
    pub price: Option<Decimal>,
    /// Trigger price, required by SL and SL-M kinds.
    pub trigger_price: Option<Decimal>,
    /// Stop-loss level the watcher should enforce once the entry fills.
    pub stop_loss: Option<Decimal>,
    /// Target level the watcher should enforce once the entry fills.
    pub target: Option<Decimal>,
    /// Product the position books under.
    pub product: Product,
    /// Which subsystem authored the intent.
    pub source: IntentSource,
}

/// An accepted, validated trading request.
///
/// Once constructed an intent never changes. All mutable lifecycle state
/// lives on the [`super::OrderRecord`] projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    command_id: CommandId,
    client_id: ClientId,
    execution_type: ExecutionType,
    exchange: Exchange,
    symbol: Symbol,
    side: Side,
    quantity: u32,
    order_kind: OrderKind,
    price: Option<Decimal>,
    trigger_price: Option<Decimal>,
    stop_loss: Option<Decimal>,
    target: Option<Decimal>,
    product: Product,
    source: IntentSource,
    created_at: Timestamp,
}

impl OrderIntent {
    /// Build and validate an intent.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::InvalidIntent`] if the quantity is zero, the
    /// symbol is malformed, or the order kind is missing its price or
    /// trigger.
    pub fn new(params: IntentParams) -> Result<Self, IntentError> {
        params
            .symbol
            .validate()
            .map_err(|e| IntentError::InvalidIntent {
                field: "symbol".to_string(),
                message: e.to_string(),
            })?;

        if params.quantity == 0 {
            return Err(IntentError::InvalidIntent {
                field: "quantity".to_string(),
                message: "Quantity must be a positive number of units".to_string(),
            });
        }

        if params.order_kind.requires_price() && params.price.is_none() {
            return Err(IntentError::InvalidIntent {
                field: "price".to_string(),
                message: format!("{} orders require a limit price", params.order_kind),
            });
        }

        if params.order_kind.requires_trigger() && params.trigger_price.is_none() {
            return Err(IntentError::InvalidIntent {
                field: "trigger_price".to_string(),
                message: format!("{} orders require a trigger price", params.order_kind),
            });
        }

        for (field, value) in [
            ("price", params.price),
            ("trigger_price", params.trigger_price),
            ("stop_loss", params.stop_loss),
            ("target", params.target),
        ] {
            if let Some(v) = value {
                if v <= Decimal::ZERO {
                    return Err(IntentError::InvalidIntent {
                        field: field.to_string(),
                        message: "Price levels must be positive".to_string(),
                    });
                }
            }
        }

        Ok(Self {
            command_id: params.command_id,
            client_id: params.client_id,
            execution_type: params.execution_type,
            exchange: params.exchange,
            symbol: params.symbol,
            side: params.side,
            quantity: params.quantity,
            order_kind: params.order_kind,
            price: params.price,
            trigger_price: params.trigger_price,
            stop_loss: params.stop_loss,
            target: params.target,
            product: params.product,
            source: params.source,
            created_at: Timestamp::now(),
        })
    }

    /// Rebuild an intent from stored state without re-validating.
    ///
    /// Repositories use this; stored rows were validated on the way in.
    #[must_use]
    pub fn reconstitute(params: IntentParams, created_at: Timestamp) -> Self {
        Self {
            command_id: params.command_id,
            client_id: params.client_id,
            execution_type: params.execution_type,
            exchange: params.exchange,
            symbol: params.symbol,
            side: params.side,
            quantity: params.quantity,
            order_kind: params.order_kind,
            price: params.price,
            trigger_price: params.trigger_price,
            stop_loss: params.stop_loss,
            target: params.target,
            product: params.product,
            source: params.source,
            created_at,
        }
    }

    /// Get the command ID.
    #[must_use]
    pub const fn command_id(&self) -> &CommandId {
        &self.command_id
    }

    /// Get the client ID.
    #[must_use]
    pub const fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Get the execution type.
    #[must_use]
    pub const fn execution_type(&self) -> ExecutionType {
        self.execution_type
    }

    /// Get the exchange.
    #[must_use]
    pub const fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Get the symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Get the side.
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Get the quantity in units.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Get the order kind.
    #[must_use]
    pub const fn order_kind(&self) -> OrderKind {
        self.order_kind
    }

    /// Get the limit price.
    #[must_use]
    pub const fn price(&self) -> Option<Decimal> {
        self.price
    }

    /// Get the trigger price.
    #[must_use]
    pub const fn trigger_price(&self) -> Option<Decimal> {
        self.trigger_price
    }

    /// Get the stop-loss level.
    #[must_use]
    pub const fn stop_loss(&self) -> Option<Decimal> {
        self.stop_loss
    }

    /// Get the target level.
    #[must_use]
    pub const fn target(&self) -> Option<Decimal> {
        self.target
    }

    /// Get the product.
    #[must_use]
    pub const fn product(&self) -> Product {
        self.product
    }

    /// Get the source.
    #[must_use]
    pub const fn source(&self) -> IntentSource {
        self.source
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Whether the entry carries levels the watcher should enforce.
    #[must_use]
    pub const fn has_exit_levels(&self) -> bool {
        self.stop_loss.is_some() || self.target.is_some()
    }

    /// The identity under which this intent counts as a duplicate.
    #[must_use]
    pub fn logical_key(&self) -> LogicalKey {
        LogicalKey {
            client_id: self.client_id.clone(),
            exchange: self.exchange,
            symbol: self.symbol.clone(),
            product: self.product,
            execution_type: self.execution_type,
        }
    }
}
