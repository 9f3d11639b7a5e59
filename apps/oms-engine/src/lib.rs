// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! OMS Engine - Rust Core Library
//!
//! Deterministic order-management engine for the Tandem trading system.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic (aggregates, value objects, state machines)
//!   - `intent`: Order intents, records, the monotonic status lifecycle
//!   - `exits`: Tracked positions, stop/target/trailing exit rules
//!   - `risk`: Per-client limits, daily PnL assessment
//!   - `shared`: Identifiers, symbols, timestamps
//!
//! - **Application**: Services and orchestration
//!   - `ports`: Interfaces for external systems (`BrokerPort`, `MarketDataPort`)
//!   - `services`: Command gate, execution guard, order watcher, risk manager,
//!     strategy engine, intent tracker
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `broker`: Paper broker simulation
//!   - `persistence`: SQLite repository, trace store, run log
//!   - `market_data` / `instruments`: Chain and contract lookups
//!   - `http`: REST command surface
//!   - `config`: Settings and dependency container
//!
//! # Invariants the engine defends
//!
//! - Order status only moves forward: `CREATED -> SENT_TO_BROKER ->
//!   {EXECUTED, FAILED}`
//! - One logical action reaches the broker at most once (three-layer guard)
//! - Every exit originates in the order watcher
//! - Broker state is the source of truth for positions and fills

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Services and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::intent::{
    ExecutionType, IntentSource, OrderIntent, OrderRecord, OrderStatus, Side,
};
pub use domain::shared::{BrokerOrderId, ClientId, CommandId, RunId, Symbol};

// Application re-exports
pub use application::services::{
    CommandService, OrderWatcherService, RiskManagerService, StrategyEngineService,
};

// Infrastructure re-exports
pub use infrastructure::config::{Container, Settings};
