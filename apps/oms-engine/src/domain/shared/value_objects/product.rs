//! Product type (margin bucket) for an order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Product type the broker books the position under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Product {
    /// Overnight derivatives (normal margin).
    Nrml,
    /// Intraday, auto squared off by the broker at end of day.
    Mis,
    /// Cash and carry (equity delivery).
    Cnc,
}

impl Product {
    /// String form as brokers expect it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nrml => "NRML",
            Self::Mis => "MIS",
            Self::Cnc => "CNC",
        }
    }

    /// Whether the broker force-closes this product intraday.
    #[must_use]
    pub const fn is_intraday(&self) -> bool {
        matches!(self, Self::Mis)
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_as_str() {
        assert_eq!(Product::Nrml.as_str(), "NRML");
        assert_eq!(Product::Mis.as_str(), "MIS");
        assert_eq!(Product::Cnc.as_str(), "CNC");
    }

    #[test]
    fn product_is_intraday() {
        assert!(Product::Mis.is_intraday());
        assert!(!Product::Nrml.is_intraday());
        assert!(!Product::Cnc.is_intraday());
    }

    #[test]
    fn product_display() {
        assert_eq!(format!("{}", Product::Nrml), "NRML");
    }

    #[test]
    fn product_serde() {
        let json = serde_json::to_string(&Product::Mis).unwrap();
        assert_eq!(json, "\"MIS\"");

        let parsed: Product = serde_json::from_str("\"CNC\"").unwrap();
        assert_eq!(parsed, Product::Cnc);
    }
}
