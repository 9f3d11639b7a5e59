//! Logical identity of a trading action, used for duplicate suppression.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ExecutionType;
use crate::domain::shared::{ClientId, Exchange, Product, Symbol};

/// The identity under which two intents count as the same action.
///
/// Two intents with the same logical key describe the same trade even when
/// their command IDs differ. The pending command set and the repository
/// guard both key on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalKey {
    /// Trading account the action belongs to.
    pub client_id: ClientId,
    /// Exchange segment.
    pub exchange: Exchange,
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Product the position books under.
    pub product: Product,
    /// What the action does to exposure.
    pub execution_type: ExecutionType,
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.client_id, self.exchange, self.symbol, self.product, self.execution_type
        )
    }
}
