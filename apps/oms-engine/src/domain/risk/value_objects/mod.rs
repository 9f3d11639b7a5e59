//! Risk Value Objects

mod limits;
mod state;
mod verdict;

pub use limits::RiskLimits;
pub use state::ClientRiskState;
pub use verdict::{RiskBreach, RiskVerdict};
