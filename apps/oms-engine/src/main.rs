//! OMS Engine Binary
//!
//! Starts the Tandem order-management engine.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin oms-engine
//! ```
//!
//! # Environment Variables
//!
//! All optional; a bare environment starts a paper engine.
//!
//! - `OMS_MODE`: PAPER | LIVE (default: PAPER)
//! - `OMS_BIND_ADDRESS`: HTTP bind address (default: 0.0.0.0:8080)
//! - `OMS_DATABASE_URL`: SQLite URL (default: sqlite:./data/oms.db)
//! - `OMS_CLIENT_ID`: broker client the engine trades for (default: PAPER01)
//! - `OMS_STRATEGY_ENABLED`: spawn the strategy loop (default: false)
//! - `OMS_PAPER_PRICES`: `SYMBOL=price` pairs to seed the paper broker
//! - `RUST_LOG`: log level (default: info)
//!
//! See `infrastructure::config::Settings` for the full list.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use oms_engine::application::ports::ResolvedInstrument;
use oms_engine::application::services::DeltaNeutralStrangle;
use oms_engine::domain::intent::OrderKind;
use oms_engine::infrastructure::broker::PaperBroker;
use oms_engine::infrastructure::config::{Container, Settings};
use oms_engine::infrastructure::http::create_router;
use oms_engine::infrastructure::instruments::StaticInstrumentResolver;
use oms_engine::infrastructure::market_data::FixedMarketData;
use oms_engine::infrastructure::persistence::{
    SqliteOrderRepository, SqliteRunStore, SqliteTraceStore, connect,
};
use oms_engine::{ClientId, RunId, Symbol};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Concrete container for the wired engine.
type EngineContainer = Container<
    SqliteOrderRepository,
    PaperBroker,
    SqliteTraceStore,
    FixedMarketData,
    StaticInstrumentResolver,
>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing();

    tracing::info!("Starting Tandem OMS engine");

    let settings = Settings::from_env()?;
    log_config(&settings);

    ensure_database_dir(&settings.database.url)?;
    let pool = connect(&settings.database.url).await?;
    let run_id = RunId::generate();
    let runs = SqliteRunStore::new(pool.clone());
    runs.open_run(
        &run_id,
        &settings.engine.engine_id,
        &settings.engine.mode,
        &settings.config_json(),
    )
    .await?;
    tracing::info!(%run_id, "Run registered");

    let repository = Arc::new(SqliteOrderRepository::new(pool.clone()));
    let trace_sink = Arc::new(SqliteTraceStore::new(pool.clone(), run_id.clone()));
    let broker = create_broker(&settings);
    let market_data = create_market_data(&settings);
    let instruments = create_instruments(&settings);

    let container = Container::new(
        repository,
        broker,
        trace_sink,
        market_data,
        instruments,
        ClientId::new(settings.engine.client_id.clone()),
        settings.risk_limits(),
        settings.watcher_config(),
    );

    let shutdown = CancellationToken::new();
    let tasks = spawn_engine_tasks(&settings, &container, &shutdown);

    serve_http(&settings, &container, shutdown.clone()).await?;

    // The HTTP server has drained; stop the background loops. Each loop
    // finishes its in-flight cycle before exiting, so no broker call is
    // abandoned mid-write.
    shutdown.cancel();
    for task in tasks {
        if let Err(error) = task.await {
            tracing::error!(%error, "Background task panicked");
        }
    }

    runs.close_run(&run_id).await?;
    pool.close().await;

    tracing::info!("OMS engine stopped");
    Ok(())
}

/// Load .env from the current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Create the database parent directory when missing.
///
/// SQLite creates a missing database file but not a missing directory.
fn ensure_database_dir(url: &str) -> std::io::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite:") {
        let path = std::path::Path::new(path);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Initialize the tracing subscriber with environment filter.
///
/// Uses static directive strings that are compile-time constants guaranteed to parse.
#[allow(clippy::expect_used)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "oms_engine=info"
                    .parse()
                    .expect("static directive 'oms_engine=info' is valid"),
            ),
        )
        .init();
}

/// Log the loaded configuration.
fn log_config(settings: &Settings) {
    tracing::info!(
        mode = %settings.engine.mode,
        client_id = %settings.engine.client_id,
        bind_address = %settings.server.bind_address,
        database = %settings.database.url,
        strategy_enabled = settings.strategy.enabled,
        "Configuration loaded"
    );
}

/// Create the paper broker, preloaded with any configured prices.
fn create_broker(settings: &Settings) -> Arc<PaperBroker> {
    if settings.engine.mode == "LIVE" {
        tracing::warn!(
            "LIVE mode configured, but only the paper broker is built in; orders stay simulated"
        );
    }
    let broker = PaperBroker::new();
    for (symbol, price) in &settings.paper.prices {
        broker.set_last_price(&Symbol::new(symbol.clone()), *price);
    }
    tracing::info!(
        seeded_prices = settings.paper.prices.len(),
        "PaperBroker initialized"
    );
    Arc::new(broker)
}

/// Create the fixed market data adapter with the configured spot.
fn create_market_data(settings: &Settings) -> Arc<FixedMarketData> {
    let market_data = FixedMarketData::new();
    if let Some(spot) = settings.paper.spot {
        market_data.set_spot(spot);
    }
    Arc::new(market_data)
}

/// Create the instrument resolver, seeded with the strategy underlying.
fn create_instruments(settings: &Settings) -> Arc<StaticInstrumentResolver> {
    let resolver = StaticInstrumentResolver::new();
    if settings.strategy.enabled {
        let today = Utc::now().date_naive();
        let expiry = settings
            .paper
            .expiry
            .unwrap_or_else(|| today.checked_add_days(Days::new(7)).unwrap_or(today));
        resolver.register(
            settings.strategy.exchange,
            Symbol::new(settings.strategy.underlying.clone()),
            ResolvedInstrument {
                expiry,
                lot_size: settings.paper.lot_size,
                order_kinds: vec![OrderKind::Market, OrderKind::Limit],
            },
        );
        tracing::info!(
            underlying = %settings.strategy.underlying,
            lot_size = settings.paper.lot_size,
            %expiry,
            "Instrument master seeded"
        );
    }
    Arc::new(resolver)
}

/// Spawn the watcher, risk heartbeat and (when enabled) strategy loops.
fn spawn_engine_tasks(
    settings: &Settings,
    container: &EngineContainer,
    shutdown: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(container.watcher().run(shutdown.clone())));
    tracing::info!(
        poll_ms = settings.watcher.poll_interval_ms,
        "Order watcher started"
    );

    tasks.push(tokio::spawn(container.risk().run(
        Duration::from_secs(settings.risk.heartbeat_secs),
        shutdown.clone(),
    )));
    tracing::info!(
        heartbeat_secs = settings.risk.heartbeat_secs,
        "Risk manager started"
    );

    if settings.strategy.enabled {
        let engine = container.strategy_engine(
            DeltaNeutralStrangle::new(settings.strangle_config()),
            Duration::from_millis(settings.strategy.poll_interval_ms),
        );
        tasks.push(tokio::spawn(engine.run(shutdown.clone())));
        tracing::info!(
            underlying = %settings.strategy.underlying,
            "Strategy engine started"
        );
    }

    tasks
}

/// Serve the HTTP surface until a shutdown signal arrives.
async fn serve_http(
    settings: &Settings,
    container: &EngineContainer,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let state = container.app_state(env!("CARGO_PKG_VERSION"));
    let app = create_router(state);

    let addr: SocketAddr = settings.server.bind_address.parse()?;
    tracing::info!(%addr, "HTTP server starting");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /api/v1/intents");
    tracing::info!("  POST /api/v1/exits");
    tracing::info!("  GET  /api/v1/orders/{{command_id}}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Better to fail fast at
/// startup than to run a process that cannot respond to termination.
#[allow(clippy::expect_used)]
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown.cancelled() => {
            tracing::info!("Shutdown requested, stopping HTTP server");
        }
    }
}
