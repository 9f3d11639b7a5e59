//! Runtime configuration.
//!
//! Settings are read from the process environment, bootstrapped from `.env`
//! by `dotenvy` in `main`. Every variable has a default so a bare environment
//! starts a paper engine against a local database. Values that feed running
//! services are converted through the `*_config()` methods so the services
//! themselves never see raw strings.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;

use crate::application::services::{StrangleConfig, WatcherConfig};
use crate::domain::exits::TrailingMode;
use crate::domain::risk::RiskLimits;
use crate::domain::shared::{ClientId, Exchange, Product, Symbol};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse.
    #[error("invalid value for {var}: {message}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// What was wrong with it.
        message: String,
    },

    /// Parsed values fail a cross-field constraint.
    #[error("config validation failed: {0}")]
    Validation(String),
}

/// Root settings for one engine process.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Database settings.
    pub database: DatabaseSettings,
    /// Engine identity.
    pub engine: EngineSettings,
    /// Order watcher settings.
    pub watcher: WatcherSettings,
    /// Risk manager settings.
    pub risk: RiskSettings,
    /// Strategy engine settings.
    pub strategy: StrategySettings,
    /// Paper broker seed data.
    pub paper: PaperSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize)]
pub struct ServerSettings {
    /// Bind address for the REST surface (`OMS_BIND_ADDRESS`).
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSettings {
    /// SQLite connection URL (`OMS_DATABASE_URL`).
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Engine identity settings.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSettings {
    /// Stable name for this engine instance (`OMS_ENGINE_ID`).
    pub engine_id: String,
    /// Trading mode, `PAPER` or `LIVE` (`OMS_MODE`).
    pub mode: String,
    /// Broker client the engine trades for (`OMS_CLIENT_ID`).
    pub client_id: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            engine_id: default_engine_id(),
            mode: default_mode(),
            client_id: default_client_id(),
        }
    }
}

/// Order watcher settings.
#[derive(Debug, Clone, Serialize)]
pub struct WatcherSettings {
    /// Watch cycle interval in milliseconds (`OMS_WATCHER_POLL_MS`).
    pub poll_interval_ms: u64,
    /// Age in seconds past which a non-terminal record is flagged stale
    /// (`OMS_STALE_AFTER_SECS`).
    pub stale_after_secs: i64,
    /// Trailing stop mode, `off`, `percent` or `points`
    /// (`OMS_TRAILING_MODE`).
    pub trailing_mode: String,
    /// Trailing distance, percent or points per the mode
    /// (`OMS_TRAILING_DISTANCE`).
    pub trailing_distance: Decimal,
    /// Maximum holding time in seconds for adopted positions
    /// (`OMS_MAX_HOLD_SECS`, unset disables).
    pub max_hold_secs: Option<i64>,
    /// Daily square-off cutoff for adopted positions, UTC `HH:MM`
    /// (`OMS_WATCHER_SQUARE_OFF`, unset disables).
    pub square_off: Option<NaiveTime>,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_watcher_poll_ms(),
            stale_after_secs: default_stale_after_secs(),
            trailing_mode: default_trailing_mode(),
            trailing_distance: Decimal::ZERO,
            max_hold_secs: None,
            square_off: None,
        }
    }
}

/// Risk manager settings.
#[derive(Debug, Clone, Serialize)]
pub struct RiskSettings {
    /// Daily loss limit as a positive magnitude (`OMS_DAILY_LOSS_LIMIT`).
    pub daily_loss_limit: Decimal,
    /// Maximum simultaneously open positions (`OMS_MAX_OPEN_POSITIONS`).
    pub max_open_positions: u32,
    /// Maximum exposure-opening orders per day (`OMS_MAX_ORDERS_PER_DAY`).
    pub max_orders_per_day: u32,
    /// Position poll heartbeat in seconds (`OMS_RISK_HEARTBEAT_SECS`).
    pub heartbeat_secs: u64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        let limits = RiskLimits::default();
        Self {
            daily_loss_limit: limits.daily_loss_limit,
            max_open_positions: limits.max_open_positions,
            max_orders_per_day: limits.max_orders_per_day,
            heartbeat_secs: default_risk_heartbeat_secs(),
        }
    }
}

/// Strategy engine settings.
#[derive(Debug, Clone, Serialize)]
pub struct StrategySettings {
    /// Whether the strategy loop is spawned at all (`OMS_STRATEGY_ENABLED`).
    pub enabled: bool,
    /// Underlying index or stock (`OMS_UNDERLYING`).
    pub underlying: String,
    /// Exchange segment for the legs (`OMS_STRATEGY_EXCHANGE`).
    pub exchange: Exchange,
    /// Product bucket for the legs (`OMS_STRATEGY_PRODUCT`).
    pub product: Product,
    /// Lots per leg (`OMS_LOTS`).
    pub lots: u32,
    /// Delta magnitude both legs are sold at (`OMS_TARGET_DELTA`).
    pub target_delta: Decimal,
    /// Net delta past which the drifting leg is rolled
    /// (`OMS_DELTA_ADJUST_TRIGGER`).
    pub delta_adjust_trigger: Decimal,
    /// Minimum quiet period between rolls in seconds
    /// (`OMS_ADJUST_COOLDOWN_SECS`).
    pub adjustment_cooldown_secs: u64,
    /// Booked profit that ends the round trip (`OMS_PROFIT_STEP`).
    pub profit_step: Decimal,
    /// No entries before this UTC wall-clock time (`OMS_ENTRY_AFTER`).
    pub entry_after: NaiveTime,
    /// Everything is closed at this UTC wall-clock time (`OMS_SQUARE_OFF`).
    pub square_off: NaiveTime,
    /// Strategy tick interval in milliseconds (`OMS_STRATEGY_POLL_MS`).
    pub poll_interval_ms: u64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            underlying: default_underlying(),
            exchange: Exchange::Nfo,
            product: Product::Nrml,
            lots: 1,
            target_delta: default_target_delta(),
            delta_adjust_trigger: default_delta_adjust_trigger(),
            adjustment_cooldown_secs: default_adjust_cooldown_secs(),
            profit_step: default_profit_step(),
            entry_after: default_entry_after(),
            square_off: default_square_off(),
            poll_interval_ms: default_strategy_poll_ms(),
        }
    }
}

/// Paper broker seed data.
#[derive(Debug, Clone, Serialize)]
pub struct PaperSettings {
    /// Last traded prices to preload, `SYMBOL=price` pairs separated by
    /// commas (`OMS_PAPER_PRICES`).
    pub prices: Vec<(String, Decimal)>,
    /// Spot level for the fixed market data adapter (`OMS_PAPER_SPOT`).
    pub spot: Option<Decimal>,
    /// Contract lot size for the seeded underlying (`OMS_LOT_SIZE`).
    pub lot_size: u32,
    /// Expiry date for the seeded underlying, `YYYY-MM-DD`
    /// (`OMS_EXPIRY`, unset means a week out).
    pub expiry: Option<NaiveDate>,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            prices: Vec::new(),
            spot: None,
            lot_size: default_lot_size(),
            expiry: None,
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_database_url() -> String {
    "sqlite:./data/oms.db".to_string()
}
fn default_engine_id() -> String {
    "oms-engine".to_string()
}
fn default_mode() -> String {
    "PAPER".to_string()
}
fn default_client_id() -> String {
    "PAPER01".to_string()
}
const fn default_watcher_poll_ms() -> u64 {
    1000
}
const fn default_stale_after_secs() -> i64 {
    90
}
fn default_trailing_mode() -> String {
    "off".to_string()
}
const fn default_risk_heartbeat_secs() -> u64 {
    5
}
fn default_underlying() -> String {
    "NIFTY".to_string()
}
fn default_target_delta() -> Decimal {
    dec!(0.25)
}
fn default_delta_adjust_trigger() -> Decimal {
    dec!(0.18)
}
const fn default_adjust_cooldown_secs() -> u64 {
    300
}
fn default_profit_step() -> Decimal {
    dec!(1500)
}
// 03:50 UTC is 09:20 IST, five minutes after NSE open.
fn default_entry_after() -> NaiveTime {
    NaiveTime::from_hms_opt(3, 50, 0).unwrap_or(NaiveTime::MIN)
}
// 09:45 UTC is 15:15 IST, fifteen minutes before NSE close.
fn default_square_off() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 45, 0).unwrap_or(NaiveTime::MIN)
}
const fn default_strategy_poll_ms() -> u64 {
    5000
}
// NIFTY contract lot size as of 2025.
const fn default_lot_size() -> u32 {
    75
}

impl Settings {
    /// Load settings from the process environment and validate them.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a variable does not parse or the
    /// combined values fail validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self {
            server: ServerSettings {
                bind_address: env_string("OMS_BIND_ADDRESS", default_bind_address()),
            },
            database: DatabaseSettings {
                url: env_string("OMS_DATABASE_URL", default_database_url()),
            },
            engine: EngineSettings {
                engine_id: env_string("OMS_ENGINE_ID", default_engine_id()),
                mode: env_string("OMS_MODE", default_mode()),
                client_id: env_string("OMS_CLIENT_ID", default_client_id()),
            },
            watcher: WatcherSettings {
                poll_interval_ms: env_parse("OMS_WATCHER_POLL_MS", default_watcher_poll_ms())?,
                stale_after_secs: env_parse("OMS_STALE_AFTER_SECS", default_stale_after_secs())?,
                trailing_mode: env_string("OMS_TRAILING_MODE", default_trailing_mode()),
                trailing_distance: env_parse("OMS_TRAILING_DISTANCE", Decimal::ZERO)?,
                max_hold_secs: env_parse_opt("OMS_MAX_HOLD_SECS")?,
                square_off: env_time_opt("OMS_WATCHER_SQUARE_OFF")?,
            },
            risk: RiskSettings {
                daily_loss_limit: env_parse(
                    "OMS_DAILY_LOSS_LIMIT",
                    RiskLimits::default().daily_loss_limit,
                )?,
                max_open_positions: env_parse(
                    "OMS_MAX_OPEN_POSITIONS",
                    RiskLimits::default().max_open_positions,
                )?,
                max_orders_per_day: env_parse(
                    "OMS_MAX_ORDERS_PER_DAY",
                    RiskLimits::default().max_orders_per_day,
                )?,
                heartbeat_secs: env_parse("OMS_RISK_HEARTBEAT_SECS", default_risk_heartbeat_secs())?,
            },
            strategy: StrategySettings {
                enabled: env_parse("OMS_STRATEGY_ENABLED", false)?,
                underlying: env_string("OMS_UNDERLYING", default_underlying()),
                exchange: env_exchange("OMS_STRATEGY_EXCHANGE", Exchange::Nfo)?,
                product: env_product("OMS_STRATEGY_PRODUCT", Product::Nrml)?,
                lots: env_parse("OMS_LOTS", 1)?,
                target_delta: env_parse("OMS_TARGET_DELTA", default_target_delta())?,
                delta_adjust_trigger: env_parse(
                    "OMS_DELTA_ADJUST_TRIGGER",
                    default_delta_adjust_trigger(),
                )?,
                adjustment_cooldown_secs: env_parse(
                    "OMS_ADJUST_COOLDOWN_SECS",
                    default_adjust_cooldown_secs(),
                )?,
                profit_step: env_parse("OMS_PROFIT_STEP", default_profit_step())?,
                entry_after: env_time("OMS_ENTRY_AFTER", default_entry_after())?,
                square_off: env_time("OMS_SQUARE_OFF", default_square_off())?,
                poll_interval_ms: env_parse("OMS_STRATEGY_POLL_MS", default_strategy_poll_ms())?,
            },
            paper: PaperSettings {
                prices: env_prices("OMS_PAPER_PRICES")?,
                spot: env_parse_opt("OMS_PAPER_SPOT")?,
                lot_size: env_parse("OMS_LOT_SIZE", default_lot_size())?,
                expiry: env_parse_opt("OMS_EXPIRY")?,
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Watcher configuration for the order watcher service.
    #[must_use]
    pub fn watcher_config(&self) -> WatcherConfig {
        let trailing = match self.watcher.trailing_mode.to_lowercase().as_str() {
            "percent" => TrailingMode::Percent {
                trail_pct: self.watcher.trailing_distance,
            },
            "points" => TrailingMode::Points {
                trail_points: self.watcher.trailing_distance,
            },
            _ => TrailingMode::Off,
        };
        WatcherConfig {
            poll_interval: Duration::from_millis(self.watcher.poll_interval_ms),
            stale_after: ChronoDuration::seconds(self.watcher.stale_after_secs),
            trailing,
            max_hold: self.watcher.max_hold_secs.map(ChronoDuration::seconds),
            square_off: self.watcher.square_off,
        }
    }

    /// Risk limits for the engine's client.
    #[must_use]
    pub const fn risk_limits(&self) -> RiskLimits {
        RiskLimits {
            daily_loss_limit: self.risk.daily_loss_limit,
            max_open_positions: self.risk.max_open_positions,
            max_orders_per_day: self.risk.max_orders_per_day,
        }
    }

    /// Strangle configuration for the strategy engine.
    #[must_use]
    pub fn strangle_config(&self) -> StrangleConfig {
        StrangleConfig {
            client_id: ClientId::new(self.engine.client_id.clone()),
            underlying: Symbol::new(self.strategy.underlying.clone()),
            exchange: self.strategy.exchange,
            product: self.strategy.product,
            lots: self.strategy.lots,
            target_delta: self.strategy.target_delta,
            delta_adjust_trigger: self.strategy.delta_adjust_trigger,
            adjustment_cooldown_secs: self.strategy.adjustment_cooldown_secs,
            profit_step: self.strategy.profit_step,
            entry_after: self.strategy.entry_after,
            square_off: self.strategy.square_off,
        }
    }

    /// Serialized form for the run audit row.
    #[must_use]
    pub fn config_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let valid_modes = ["PAPER", "LIVE"];
        if !valid_modes.contains(&self.engine.mode.as_str()) {
            return Err(ConfigError::Validation(format!(
                "mode must be one of: {valid_modes:?}"
            )));
        }
        if self.watcher.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "watcher poll interval must be positive".to_string(),
            ));
        }
        let valid_trailing = ["off", "percent", "points"];
        let trailing = self.watcher.trailing_mode.to_lowercase();
        if !valid_trailing.contains(&trailing.as_str()) {
            return Err(ConfigError::Validation(format!(
                "trailing mode must be one of: {valid_trailing:?}"
            )));
        }
        if trailing != "off" && self.watcher.trailing_distance <= Decimal::ZERO {
            return Err(ConfigError::Validation(
                "trailing distance must be positive when trailing is on".to_string(),
            ));
        }
        if self.risk.daily_loss_limit <= Decimal::ZERO {
            return Err(ConfigError::Validation(
                "daily loss limit must be a positive magnitude".to_string(),
            ));
        }
        if self.strategy.enabled {
            if self.strategy.lots == 0 || self.paper.lot_size == 0 {
                return Err(ConfigError::Validation(
                    "lots and lot size must be at least 1".to_string(),
                ));
            }
            if self.strategy.target_delta <= Decimal::ZERO
                || self.strategy.target_delta >= Decimal::ONE
            {
                return Err(ConfigError::Validation(
                    "target delta must be between 0 and 1".to_string(),
                ));
            }
            if self.strategy.delta_adjust_trigger <= Decimal::ZERO {
                return Err(ConfigError::Validation(
                    "delta adjust trigger must be positive".to_string(),
                ));
            }
            if self.strategy.entry_after >= self.strategy.square_off {
                return Err(ConfigError::Validation(
                    "entry window must open before square-off".to_string(),
                ));
            }
            if self.strategy.poll_interval_ms == 0 {
                return Err(ConfigError::Validation(
                    "strategy poll interval must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn read_var(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.is_empty())
}

fn env_string(var: &str, default: String) -> String {
    read_var(var).unwrap_or(default)
}

fn env_parse<T>(var: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    read_var(var).map_or(Ok(default), |raw| {
        raw.parse().map_err(|error| ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("{error}"),
        })
    })
}

fn env_parse_opt<T>(var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    read_var(var).map_or(Ok(None), |raw| {
        raw.parse()
            .map(Some)
            .map_err(|error| ConfigError::InvalidValue {
                var: var.to_string(),
                message: format!("{error}"),
            })
    })
}

/// Parse `HH:MM` or `HH:MM:SS` wall-clock times.
fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn env_time(var: &str, default: NaiveTime) -> Result<NaiveTime, ConfigError> {
    read_var(var).map_or(Ok(default), |raw| {
        parse_time(&raw).ok_or_else(|| ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("expected HH:MM, got {raw}"),
        })
    })
}

fn env_time_opt(var: &str) -> Result<Option<NaiveTime>, ConfigError> {
    read_var(var).map_or(Ok(None), |raw| {
        parse_time(&raw)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                var: var.to_string(),
                message: format!("expected HH:MM, got {raw}"),
            })
    })
}

fn env_exchange(var: &str, default: Exchange) -> Result<Exchange, ConfigError> {
    read_var(var).map_or(Ok(default), |raw| {
        Exchange::parse(&raw).map_err(|error| ConfigError::InvalidValue {
            var: var.to_string(),
            message: error.to_string(),
        })
    })
}

fn env_product(var: &str, default: Product) -> Result<Product, ConfigError> {
    read_var(var).map_or(Ok(default), |raw| match raw.as_str() {
        "NRML" => Ok(Product::Nrml),
        "MIS" => Ok(Product::Mis),
        "CNC" => Ok(Product::Cnc),
        other => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("unknown product {other}"),
        }),
    })
}

/// Parse `SYMBOL=price` pairs separated by commas.
fn env_prices(var: &str) -> Result<Vec<(String, Decimal)>, ConfigError> {
    let Some(raw) = read_var(var) else {
        return Ok(Vec::new());
    };
    let mut prices = Vec::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (symbol, price) = pair.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("expected SYMBOL=price, got {pair}"),
        })?;
        let price = price.parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("bad price in {pair}"),
        })?;
        prices.push((symbol.to_string(), price));
    }
    Ok(prices)
}
