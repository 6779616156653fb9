use anyhow::{Context, Result};
use brewtwin::api::{
    create_admin_router, create_dashboard_router, create_ws_router, AdminAppState,
    DashboardAppState, WsAppState,
};
use brewtwin::cache::{DeviceCache, PitCache};
use brewtwin::config::{load_config, new_runtime_config, BrewConfig, StorageBackend};
use brewtwin::dashboard::DashboardService;
use brewtwin::simulation::{run_simulator, Simulator, SimulatorDeps};
use brewtwin::store::seed::seed_demo_data;
use brewtwin::store::{MemoryStore, SqliteStore, Store};
use brewtwin::subscription::Broadcaster;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brewtwin=info".into()),
        )
        .init();

    info!("Brewtwin starting...");

    let config_path =
        std::env::var("BREWTWIN_CONFIG").unwrap_or_else(|_| "brewtwin.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        load_config(&config_path)?
    } else {
        warn!(path = %config_path, "Config file not found, using defaults");
        BrewConfig::default()
    };

    let store: Arc<dyn Store> = match config.storage.backend {
        StorageBackend::Sqlite => Arc::new(
            SqliteStore::new(&config.storage.sqlite_path)
                .context("Failed to initialize SQLite store")?,
        ),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!(
        backend = ?config.storage.backend,
        path = %config.storage.sqlite_path,
        "Store initialized"
    );

    if config.seed.enabled {
        seed_demo_data(store.as_ref(), &config.seed, &mut rand::thread_rng())
            .context("Failed to seed demo data")?;
    }

    // Shared state
    let pit_cache = Arc::new(PitCache::new());
    let device_cache = Arc::new(DeviceCache::new());
    let broadcaster = Arc::new(Broadcaster::new());
    let runtime_config = new_runtime_config(&config.simulator);

    let simulator = Arc::new(Simulator::new(
        SimulatorDeps {
            store: Arc::clone(&store),
            pit_cache: Arc::clone(&pit_cache),
            device_cache: Arc::clone(&device_cache),
            broadcaster: Arc::clone(&broadcaster),
            runtime: Arc::clone(&runtime_config),
        },
        config.simulator.walk.clone(),
        Box::new(StdRng::from_entropy()),
    ));

    let dashboard = Arc::new(DashboardService::new(
        Arc::clone(&store),
        Arc::clone(&pit_cache),
        Arc::clone(&device_cache),
        Arc::clone(&broadcaster),
        simulator.metrics().clone(),
    ));

    // Simulator task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let simulator_handle = tokio::spawn(run_simulator(
        Arc::clone(&simulator),
        Duration::from_millis(config.simulator.interval_ms.max(1)),
        shutdown_rx,
    ));

    // HTTP + WebSocket
    let ws_state = Arc::new(WsAppState {
        broadcaster: Arc::clone(&broadcaster),
        subscriber_buffer: config.server.subscriber_buffer,
        send_timeout: Duration::from_millis(config.server.send_timeout_ms),
    });
    let admin_state = AdminAppState {
        runtime_config: Arc::clone(&runtime_config),
        admin_token: std::env::var("BREWTWIN_ADMIN_TOKEN").ok(),
    };
    let dashboard_state = Arc::new(DashboardAppState { dashboard });

    let app = create_ws_router(ws_state)
        .merge(create_dashboard_router(dashboard_state))
        .merge(create_admin_router(admin_state))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "HTTP server listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    // Let an in-flight tick finish before exiting
    let _ = shutdown_tx.send(true);
    if let Err(e) = simulator_handle.await {
        warn!(error = %e, "Simulator task ended abnormally");
    }
    server_handle.abort();
    info!("Brewtwin stopped");

    Ok(())
}
