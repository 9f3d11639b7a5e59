//! Risk Bounded Context
//!
//! Per-client daily limits and the pure checks against them. Daily PnL is
//! always derived from broker-reported positions; nothing in here estimates
//! PnL from local fills.

pub mod services;
pub mod value_objects;

pub use services::RiskAssessor;
pub use value_objects::{ClientRiskState, RiskBreach, RiskLimits, RiskVerdict};
