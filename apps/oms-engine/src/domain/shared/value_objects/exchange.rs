//! Exchange value object.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// Exchange segment an instrument trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    /// NSE cash segment.
    #[serde(rename = "NSE")]
    Nse,
    /// NSE futures and options segment.
    #[serde(rename = "NFO")]
    Nfo,
    /// BSE cash segment.
    #[serde(rename = "BSE")]
    Bse,
    /// BSE futures and options segment.
    #[serde(rename = "BFO")]
    Bfo,
    /// Multi Commodity Exchange.
    #[serde(rename = "MCX")]
    Mcx,
}

impl Exchange {
    /// String form as brokers expect it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nse => "NSE",
            Self::Nfo => "NFO",
            Self::Bse => "BSE",
            Self::Bfo => "BFO",
            Self::Mcx => "MCX",
        }
    }

    /// Whether this is a derivatives segment.
    #[must_use]
    pub const fn is_derivatives(&self) -> bool {
        matches!(self, Self::Nfo | Self::Bfo | Self::Mcx)
    }

    /// Parse from the broker's string form.
    ///
    /// # Errors
    ///
    /// Returns error for an unknown exchange code.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "NSE" => Ok(Self::Nse),
            "NFO" => Ok(Self::Nfo),
            "BSE" => Ok(Self::Bse),
            "BFO" => Ok(Self::Bfo),
            "MCX" => Ok(Self::Mcx),
            other => Err(DomainError::InvalidValue {
                field: "exchange".to_string(),
                message: format!("Unknown exchange code: {other}"),
            }),
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
