//! Origin of an order intent, kept for the audit trail.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which subsystem authored an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentSource {
    /// A strategy state machine.
    Strategy,
    /// The risk manager (forced exits).
    RiskManager,
    /// The order watcher (triggered exits, reconciliation).
    Watcher,
    /// An external webhook bridge via the HTTP surface.
    Webhook,
    /// A human operator via the HTTP surface.
    Console,
}

impl fmt::Display for IntentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strategy => write!(f, "STRATEGY"),
            Self::RiskManager => write!(f, "RISK_MANAGER"),
            Self::Watcher => write!(f, "WATCHER"),
            Self::Webhook => write!(f, "WEBHOOK"),
            Self::Console => write!(f, "CONSOLE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_source_display() {
        assert_eq!(format!("{}", IntentSource::Strategy), "STRATEGY");
        assert_eq!(format!("{}", IntentSource::RiskManager), "RISK_MANAGER");
        assert_eq!(format!("{}", IntentSource::Watcher), "WATCHER");
    }

    #[test]
    fn intent_source_serde() {
        let json = serde_json::to_string(&IntentSource::RiskManager).unwrap();
        assert_eq!(json, "\"RISK_MANAGER\"");

        let parsed: IntentSource = serde_json::from_str("\"CONSOLE\"").unwrap();
        assert_eq!(parsed, IntentSource::Console);
    }
}
