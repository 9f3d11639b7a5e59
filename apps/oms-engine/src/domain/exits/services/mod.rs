//! Exit Management Domain Services

mod evaluator;

pub use evaluator::ExitEvaluator;
