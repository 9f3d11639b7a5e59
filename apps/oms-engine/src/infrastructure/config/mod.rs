//! Configuration and wiring.
//!
//! Environment-driven settings plus the dependency container that turns them
//! into running services.

mod container;
mod settings;

pub use container::Container;
pub use settings::{
    ConfigError, DatabaseSettings, EngineSettings, PaperSettings, RiskSettings, ServerSettings,
    Settings, StrategySettings, WatcherSettings,
};
