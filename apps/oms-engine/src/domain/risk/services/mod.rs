//! Risk Domain Services

mod assessor;

pub use assessor::RiskAssessor;
